//! Usage summaries and stale-artifact suggestions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::registry::{Registry, StorageError};

/// Age past which a never-fetched artifact is suggested for deletion.
const STALE_AGE_DAYS: i64 = 7;

/// Per-artifact usage summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub name: String,
    pub lookup_key: String,
    pub fetch_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch: Option<DateTime<Utc>>,
    pub expiry: DateTime<Utc>,
}

/// Usage report for one principal's working set (or everything, for admins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// One summary per visible artifact, creation order.
    pub summaries: Vec<UsageSummary>,
    /// Names of artifacts that were never fetched and are older than a week;
    /// candidates for deletion.
    pub stale: Vec<String>,
}

/// Produces usage reports over the registry.
pub struct StatsService {
    registry: Arc<Registry>,
}

impl StatsService {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Report over the records visible to `identity`.
    pub fn report(&self, identity: &Identity, now: DateTime<Utc>) -> Result<StatsReport, StorageError> {
        let records = if identity.is_admin() {
            self.registry.list_all()?
        } else {
            self.registry.list_by_owner(&identity.principal)?
        };

        let stale = records
            .iter()
            .filter(|r| r.usage.fetch_count == 0 && now - r.created_at > Duration::days(STALE_AGE_DAYS))
            .map(|r| r.name.clone())
            .collect();

        let summaries = records
            .into_iter()
            .map(|r| UsageSummary {
                name: r.name,
                lookup_key: r.lookup_key,
                fetch_count: r.usage.fetch_count,
                last_fetch: r.usage.last_fetch,
                expiry: r.expiry,
            })
            .collect();

        Ok(StatsReport { summaries, stale })
    }
}
