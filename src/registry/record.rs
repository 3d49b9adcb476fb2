//! Artifact record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transform::Tier;

/// Unique artifact identifier.
///
/// Lowercase ULID string: lexically sortable and monotonic enough that ids
/// assigned in creation order also sort in creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// View as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Fetch usage counters, mutated only by a successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of successful fetches.
    pub fetch_count: u64,
    /// When the artifact was last served, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<DateTime<Utc>>,
}

/// A stored, sealed script artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Unique identifier, immutable after creation.
    pub id: RecordId,
    /// Uploading principal, immutable after creation.
    pub owner: String,
    /// Opaque lookup key; the sole credential for fetch. Unique among
    /// non-expired records.
    pub lookup_key: String,
    /// Display label.
    pub name: String,
    /// Transformed artifact text.
    pub payload: String,
    /// Hex HMAC tag over `payload`, recomputed whenever the payload changes.
    pub integrity_tag: String,
    /// Instant at or after which the record is logically dead.
    pub expiry: DateTime<Utc>,
    /// Obfuscation tier applied at upload. Informational; never re-applied.
    pub tier: Tier,
    /// Fetch counters.
    #[serde(default)]
    pub usage: Usage,
    /// Creation instant, immutable.
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Whether the record is logically dead at `now`. The boundary instant
    /// itself counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}
