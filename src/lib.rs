//! scriptgate - sealed script artifact registry and delivery gate
//!
//! This crate implements a registry for versioned, access-controlled script
//! artifacts: authors upload Lua source, which is compacted at a chosen
//! obfuscation tier, sealed with a keyed integrity tag, and registered
//! under an opaque lookup key with an expiry. Remote consumers fetch by key
//! through a pipeline that verifies integrity, enforces expiry, throttles
//! per-key request rate, and audits unauthorized lookups.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod ingest;
pub mod protocol;
pub mod ratelimit;
pub mod registry;
pub mod seal;
pub mod stats;
pub mod transform;

pub use api::ApiHandler;
pub use config::ServiceConfig;
pub use delivery::{DeliveryService, FetchOutcome};
pub use ingest::{IngestService, UploadRequest};
pub use protocol::{ApiError, ApiRequest, ApiResponse, StatusCode};
pub use registry::{ArtifactRecord, RecordId, Registry};
pub use seal::{SealSecret, Sealer};
pub use transform::Tier;
