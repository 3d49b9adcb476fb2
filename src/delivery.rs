//! Fetch orchestration.
//!
//! Per-fetch state machine: Lookup → ExpiryCheck → RateCheck →
//! IntegrityCheck → Serve, with early exits. Every terminal outcome is
//! produced exactly once and no step retries; a denied or failed fetch
//! requires a new client request.
//!
//! The whole machine runs inside a single registry critical section
//! ([`Registry::with_key_mut`]), so the rate decision and the counter
//! increment act on the same locked read and concurrent fetches of the same
//! key cannot both slip through the cooldown.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::AccessAuditor;
use crate::ratelimit::RateLimiter;
use crate::registry::{Registry, StorageError};
use crate::seal::Sealer;

/// Terminal outcome of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Payload served; usage counters were updated.
    Served { payload: String },
    /// Key resolves to no record. Audited as an unauthorized attempt.
    Forbidden,
    /// Record exists but its expiry has passed.
    Gone,
    /// Cooldown window not yet elapsed. No state was mutated.
    TooManyRequests,
    /// Stored tag does not match a fresh recomputation: corruption or
    /// tampering, never a client-correctable condition.
    IntegrityFailure,
}

/// Orchestrates key-based artifact delivery.
pub struct DeliveryService {
    registry: Arc<Registry>,
    sealer: Sealer,
    limiter: RateLimiter,
    auditor: Arc<AccessAuditor>,
}

impl DeliveryService {
    pub fn new(
        registry: Arc<Registry>,
        sealer: Sealer,
        limiter: RateLimiter,
        auditor: Arc<AccessAuditor>,
    ) -> Self {
        Self {
            registry,
            sealer,
            limiter,
            auditor,
        }
    }

    /// Run one fetch for `key` at `now`.
    ///
    /// Storage failures abort the in-flight fetch without partial writes.
    pub fn fetch(
        &self,
        key: &str,
        source_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome, StorageError> {
        let sealer = &self.sealer;
        let limiter = &self.limiter;

        let outcome = self.registry.with_key_mut(key, |record| {
            let Some(record) = record else {
                return FetchOutcome::Forbidden;
            };
            if record.is_expired(now) {
                // The record stays in place until the next sweep.
                return FetchOutcome::Gone;
            }
            if !limiter.allow(record.usage.last_fetch, now) {
                return FetchOutcome::TooManyRequests;
            }
            if !sealer.verify(record.payload.as_bytes(), &record.integrity_tag) {
                return FetchOutcome::IntegrityFailure;
            }
            record.usage.fetch_count += 1;
            record.usage.last_fetch = Some(now);
            FetchOutcome::Served {
                payload: record.payload.clone(),
            }
        })?;

        // Audit and operator logging happen outside the lock; neither is a
        // transactional participant in the fetch.
        match &outcome {
            FetchOutcome::Forbidden => {
                self.auditor.unauthorized(key, source_address, now);
                eprintln!("delivery: unauthorized lookup for key '{}'", key);
            }
            FetchOutcome::IntegrityFailure => {
                eprintln!("delivery: integrity tag mismatch for key '{}'", key);
            }
            _ => {}
        }

        Ok(outcome)
    }
}
