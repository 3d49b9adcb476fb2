//! Upload orchestration and owner mutations.
//!
//! Upload: validate → authorize → syntax pre-check → transform → seal →
//! insert → opportunistic sweep. A record is never stored with an unknown
//! transform state; any transform failure aborts the upload.
//!
//! Edit never re-runs the transform tier: callers supply the payload text
//! they want stored (re-invoking the transform themselves if they want it),
//! and the recorded tier stays informational. Payload edits always recompute
//! the integrity tag.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::auth::{Identity, Role};
use crate::registry::{ArtifactRecord, RecordId, Registry, RegistryError, StorageError, Usage};
use crate::seal::Sealer;
use crate::transform::{self, Tier, TransformError};

/// Separator line between member payloads of a bundle.
pub const BUNDLE_SEPARATOR: &str = "\n-- Bundle Separator\n";

/// Errors surfaced by ingestion operations.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("lookup key '{key}' is already in use")]
    Conflict { key: String },

    #[error("record not found")]
    NotFound,

    #[error("record is owned by another principal")]
    NotOwner,

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<RegistryError> for IngestError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Conflict { key } => IngestError::Conflict { key },
            RegistryError::NotFound => IngestError::NotFound,
            RegistryError::Storage(e) => IngestError::Storage(e),
        }
    }
}

/// One upload request, fields as supplied by the caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub key: String,
    pub source: String,
    /// Days until expiry; defaults to the configured value.
    pub expiry_days: Option<u32>,
    pub tier: Tier,
}

/// Limits applied at ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    /// Hard ceiling on guest-supplied expiry, in days.
    pub guest_expiry_ceiling_days: u32,
    /// Expiry applied when the caller supplies none, in days.
    pub default_expiry_days: u32,
    /// Maximum accepted source size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            guest_expiry_ceiling_days: 7,
            default_expiry_days: 30,
            max_payload_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Orchestrates uploads and owner-restricted mutations.
pub struct IngestService {
    registry: Arc<Registry>,
    sealer: Sealer,
    limits: IngestLimits,
}

impl IngestService {
    pub fn new(registry: Arc<Registry>, sealer: Sealer, limits: IngestLimits) -> Self {
        Self {
            registry,
            sealer,
            limits,
        }
    }

    /// Upload a new artifact. Returns the fresh record id.
    pub fn upload(
        &self,
        identity: &Identity,
        request: UploadRequest,
        now: DateTime<Utc>,
    ) -> Result<RecordId, IngestError> {
        if request.name.trim().is_empty() {
            return Err(IngestError::Validation("name must not be empty".to_string()));
        }
        if request.key.trim().is_empty() {
            return Err(IngestError::Validation("key must not be empty".to_string()));
        }
        if request.source.is_empty() {
            return Err(IngestError::Validation("source must not be empty".to_string()));
        }
        if request.source.len() > self.limits.max_payload_bytes {
            return Err(IngestError::Validation(format!(
                "source of {} bytes exceeds the {} byte limit",
                request.source.len(),
                self.limits.max_payload_bytes
            )));
        }

        // The ceiling binds what guests explicitly ask for; an unset expiry
        // takes the service default.
        if identity.role == Role::Guest {
            if let Some(days) = request.expiry_days {
                if days > self.limits.guest_expiry_ceiling_days {
                    return Err(IngestError::Authorization(format!(
                        "guests may not set expiry beyond {} days",
                        self.limits.guest_expiry_ceiling_days
                    )));
                }
            }
        }
        let expiry_days = request.expiry_days.unwrap_or(self.limits.default_expiry_days);

        // Coarse heuristic only; a balanced count proves nothing.
        if !transform::parens_balanced(&request.source) {
            return Err(IngestError::Validation(
                "unbalanced parentheses in source".to_string(),
            ));
        }

        let payload = transform::transform(&request.source, request.tier)?;
        let integrity_tag = self.sealer.seal(payload.as_bytes());

        let record = ArtifactRecord {
            id: RecordId::generate(),
            owner: identity.principal.clone(),
            lookup_key: request.key,
            name: request.name,
            payload,
            integrity_tag,
            expiry: now + Duration::days(i64::from(expiry_days)),
            tier: request.tier,
            usage: Usage::default(),
            created_at: now,
        };

        let id = self.registry.create(record, now)?;
        self.sweep_opportunistically(now);
        Ok(id)
    }

    /// Edit an owned record. `new_payload` replaces the stored text verbatim
    /// and recomputes the tag; `new_name` relabels the record.
    pub fn edit(
        &self,
        identity: &Identity,
        id: &RecordId,
        new_payload: Option<String>,
        new_name: Option<String>,
    ) -> Result<ArtifactRecord, IngestError> {
        self.check_owner(identity, id)?;

        if new_payload.is_none() && new_name.is_none() {
            return Err(IngestError::Validation("nothing to edit".to_string()));
        }

        let sealer = &self.sealer;
        let updated = self.registry.update(id, |record| {
            if let Some(payload) = new_payload {
                record.integrity_tag = sealer.seal(payload.as_bytes());
                record.payload = payload;
            }
            if let Some(name) = new_name {
                record.name = name;
            }
        })?;
        Ok(updated)
    }

    /// Delete an owned record.
    pub fn delete(&self, identity: &Identity, id: &RecordId) -> Result<(), IngestError> {
        self.check_owner(identity, id)?;
        if self.registry.delete(id)? {
            Ok(())
        } else {
            // Raced with a sweep or another delete.
            Err(IngestError::NotFound)
        }
    }

    /// Compose the caller's own artifacts into a new sealed bundle record.
    ///
    /// Every key must resolve to a live record owned by the caller, or the
    /// whole bundle fails. The bundle is sealed like any other artifact;
    /// there is no unsealed exemption for composites.
    pub fn bundle(
        &self,
        identity: &Identity,
        keys: &[String],
        bundle_name: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, IngestError> {
        if bundle_name.trim().is_empty() {
            return Err(IngestError::Validation(
                "bundle name must not be empty".to_string(),
            ));
        }
        if keys.is_empty() {
            return Err(IngestError::Validation(
                "bundle requires at least one key".to_string(),
            ));
        }

        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            let record = self
                .registry
                .get_by_key(key)?
                .filter(|r| r.owner == identity.principal && !r.is_expired(now))
                .ok_or_else(|| {
                    IngestError::Authorization(format!(
                        "key '{}' does not reference a live artifact you own",
                        key
                    ))
                })?;
            parts.push(record.payload);
        }

        let payload = parts.join(BUNDLE_SEPARATOR);
        let integrity_tag = self.sealer.seal(payload.as_bytes());
        let id = RecordId::generate();

        let record = ArtifactRecord {
            lookup_key: format!("bundle-{}", id),
            id: id.clone(),
            owner: identity.principal.clone(),
            name: bundle_name.to_string(),
            payload,
            integrity_tag,
            expiry: now + Duration::days(30),
            tier: Tier::None,
            usage: Usage::default(),
            created_at: now,
        };

        let id = self.registry.create(record, now)?;
        Ok(id)
    }

    fn check_owner(&self, identity: &Identity, id: &RecordId) -> Result<(), IngestError> {
        let record = self.registry.get_by_id(id)?.ok_or(IngestError::NotFound)?;
        if record.owner != identity.principal {
            return Err(IngestError::NotOwner);
        }
        Ok(())
    }

    /// Cheap housekeeping after a successful write; not guaranteed
    /// exhaustive, and never fails the operation it rides on.
    fn sweep_opportunistically(&self, now: DateTime<Utc>) {
        if let Err(e) = self.registry.sweep_expired(now) {
            eprintln!("ingest: opportunistic sweep failed: {}", e);
        }
    }
}
