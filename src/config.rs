//! Service configuration.
//!
//! Two layers: built-in defaults, then an optional TOML file. The sealing
//! secret may additionally come from the `SCRIPTGATE_SECRET_BASE64`
//! environment variable, which wins over the file.
//!
//! There is no implicit secret: building a sealer without configured secret
//! material fails unless the caller explicitly opts into the labeled
//! development mode.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ingest::IngestLimits;
use crate::ratelimit::RateLimiter;
use crate::seal::{SealSecret, Sealer, SecretError};

/// Environment variable overriding the configured secret.
pub const SECRET_ENV_VAR: &str = "SCRIPTGATE_SECRET_BASE64";

/// Errors loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid sealing secret: {0}")]
    Secret(#[from] SecretError),

    #[error("no sealing secret configured; set {SECRET_ENV_VAR} or pass --insecure-dev")]
    MissingSecret,
}

/// Service settings with built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base64-encoded sealing secret.
    pub secret_base64: Option<String>,
    /// Rate-limit window in seconds.
    pub rate_window_secs: u64,
    /// Requests allowed per window per key.
    pub rate_max_requests: u32,
    /// Guest expiry ceiling in days.
    pub guest_expiry_ceiling_days: u32,
    /// Expiry applied when the uploader supplies none, in days.
    pub default_expiry_days: u32,
    /// Maximum accepted source size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            secret_base64: None,
            rate_window_secs: 3600,
            rate_max_requests: 10,
            guest_expiry_ceiling_days: 7,
            default_expiry_days: 30,
            max_payload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(SECRET_ENV_VAR) {
            if !value.is_empty() {
                self.secret_base64 = Some(value);
            }
        }
    }

    /// Build the sealer from configured secret material.
    ///
    /// With no secret configured this fails unless `allow_insecure_dev` is
    /// set, in which case the labeled development sealer is returned.
    pub fn sealer(&self, allow_insecure_dev: bool) -> Result<Sealer, ConfigError> {
        match &self.secret_base64 {
            Some(encoded) => Ok(Sealer::new(SealSecret::from_base64(encoded)?)),
            None if allow_insecure_dev => Ok(Sealer::insecure_dev()),
            None => Err(ConfigError::MissingSecret),
        }
    }

    /// Rate limiter matching the configured window.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            chrono::Duration::seconds(self.rate_window_secs as i64),
            self.rate_max_requests,
        )
    }

    /// Ingestion limits matching the configured ceilings.
    pub fn ingest_limits(&self) -> IngestLimits {
        IngestLimits {
            guest_expiry_ceiling_days: self.guest_expiry_ceiling_days,
            default_expiry_days: self.default_expiry_days,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}
