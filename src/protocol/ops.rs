//! Operation-specific payload types.
//!
//! Every authenticated operation carries the caller's decoded identity
//! assertion. The serve loop trusts its upstream to have verified the
//! assertion cryptographically; the core only checks shape and validity
//! window.

use serde::{Deserialize, Serialize};

use crate::audit::AccessLogEntry;
use crate::auth::Identity;
use crate::registry::ArtifactRecord;
use crate::stats::StatsReport;
use crate::transform::Tier;

/// Known operation names.
pub mod names {
    pub const FETCH: &str = "fetch";
    pub const UPLOAD: &str = "upload";
    pub const EDIT: &str = "edit";
    pub const DELETE: &str = "delete";
    pub const LIST: &str = "list";
    pub const BUNDLE: &str = "bundle";
    pub const STATS: &str = "stats";
    pub const AUDIT_EXPORT: &str = "audit_export";
}

/// Fetch an artifact by lookup key. The key is the sole credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchParams {
    pub key: String,
    /// Remote address as seen by the transport, for audit entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
}

/// Successful fetch body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReply {
    pub payload: String,
}

/// Upload a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadParams {
    pub identity: Identity,
    pub name: String,
    pub key: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
    #[serde(default)]
    pub tier: Tier,
}

/// Upload result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReply {
    pub id: String,
}

/// Edit an owned artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditParams {
    pub identity: Identity,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

/// Delete an owned artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParams {
    pub identity: Identity,
    pub id: String,
}

/// List visible artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    pub identity: Identity,
}

/// List result: full set for admins, owner-filtered otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReply {
    pub records: Vec<ArtifactRecord>,
}

/// Compose owned artifacts into a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleParams {
    pub identity: Identity,
    pub keys: Vec<String>,
    pub bundle_name: String,
}

/// Bundle result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReply {
    pub id: String,
}

/// Usage statistics request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsParams {
    pub identity: Identity,
}

/// Usage statistics reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReply {
    #[serde(flatten)]
    pub report: StatsReport,
}

/// Audit log export request.
///
/// Non-admin visibility follows current ownership: the caller sees entries
/// for the lookup keys their live records hold right now. Entries for keys
/// whose records have since been deleted or swept drop out of that view.
/// Admins always see the full log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExportParams {
    pub identity: Identity,
}

/// Audit log export reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExportReply {
    pub entries: Vec<AccessLogEntry>,
}
