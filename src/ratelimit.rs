//! Per-key fetch cooldown.
//!
//! The limiter keeps no state of its own: the decision is made against the
//! record's `usage.last_fetch`, read under the registry lock by the caller.
//! That keeps a single source of truth and means a racing pair of fetches
//! cannot both pass against a stale timestamp.

use chrono::{DateTime, Duration, Utc};

/// Cooldown gate consulted on every fetch. Never blocks the caller.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    min_spacing: Duration,
}

impl RateLimiter {
    /// Build a limiter allowing `max_requests` per `window`, enforced as a
    /// minimum spacing of `window / max_requests` between fetches.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        let requests = max_requests.max(1) as i32;
        Self {
            min_spacing: window / requests,
        }
    }

    /// Minimum spacing enforced between successful fetches of one key.
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Whether a fetch at `now` is allowed given the key's last successful
    /// fetch. A never-fetched key is always allowed.
    pub fn allow(&self, last_fetch: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_fetch {
            None => true,
            Some(last) => now - last >= self.min_spacing,
        }
    }
}

impl Default for RateLimiter {
    /// Reference policy: 10 requests per hour per key.
    fn default() -> Self {
        Self::new(Duration::hours(1), 10)
    }
}
