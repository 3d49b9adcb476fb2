//! Unauthorized-lookup audit log.
//!
//! Append-only: entries are never mutated or deleted by the core (retention
//! is an external concern). Recording is fire-and-forget best-effort
//! observability — a failure to append must never block or fail the fetch
//! it accompanies, so `record` is infallible to callers and degrades to a
//! stderr note.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// Kind of audited access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// Fetch attempted with a key that resolves to no record.
    Unauthorized,
}

/// One audited access event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Event kind.
    pub kind: AccessKind,
    /// The lookup key the client presented.
    pub attempted_key: String,
    /// Remote address, when the transport knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
}

/// Append-only access auditor.
#[derive(Debug, Default)]
pub struct AccessAuditor {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl AccessAuditor {
    /// Create an empty auditor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Never fails; a poisoned log degrades to stderr.
    pub fn record(&self, entry: AccessLogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(_) => {
                eprintln!(
                    "audit: log unavailable, dropping entry for key '{}'",
                    entry.attempted_key
                );
            }
        }
    }

    /// Convenience for the delivery path: record an unauthorized lookup.
    pub fn unauthorized(&self, attempted_key: &str, source_address: Option<&str>, now: DateTime<Utc>) {
        self.record(AccessLogEntry {
            kind: AccessKind::Unauthorized,
            attempted_key: attempted_key.to_string(),
            source_address: source_address.map(str::to_string),
            timestamp: now,
        });
    }

    /// Export entries visible to the given identity: admins see everything,
    /// other principals see only entries for keys in `owned_keys`. Callers
    /// pass the keys the principal owns at export time, so ownership is
    /// evaluated now, not at the instant an entry was recorded.
    pub fn export(&self, identity: &Identity, owned_keys: &[String]) -> Vec<AccessLogEntry> {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        if identity.is_admin() {
            entries.clone()
        } else {
            entries
                .iter()
                .filter(|e| owned_keys.iter().any(|k| *k == e.attempted_key))
                .cloned()
                .collect()
        }
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
