//! Keyed integrity tags over artifact payloads.
//!
//! Every directly uploaded artifact is sealed with an HMAC-SHA256 tag at
//! ingestion and re-verified on every fetch; a stored tag that no longer
//! matches a fresh recomputation means corruption or tampering and the
//! payload must not be served.
//!
//! The secret is injected at construction. There is no implicit production
//! fallback: [`Sealer::insecure_dev`] exists for local development only and
//! the serve path requires an explicit opt-in to use it.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Fixed development-only secret. Never used unless explicitly requested.
const DEV_SECRET: &[u8] = b"scriptgate-insecure-dev-secret";

/// Errors constructing a sealing secret.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("secret must not be empty")]
    Empty,
}

/// Sealing secret material.
#[derive(Clone)]
pub struct SealSecret(Vec<u8>);

impl SealSecret {
    /// Build a secret from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Build a secret from its base64 encoding, as carried in configuration.
    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        let bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded.trim())?;
        Self::from_bytes(bytes)
    }
}

impl std::fmt::Debug for SealSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material stays out of logs.
        write!(f, "SealSecret({} bytes)", self.0.len())
    }
}

/// Computes and verifies keyed integrity tags.
#[derive(Debug, Clone)]
pub struct Sealer {
    key: SealSecret,
    dev_mode: bool,
}

impl Sealer {
    /// Create a sealer with an explicitly injected secret.
    pub fn new(secret: SealSecret) -> Self {
        Self {
            key: secret,
            dev_mode: false,
        }
    }

    /// Create a sealer with a fixed, publicly known secret.
    ///
    /// For local development and tests only; tags produced in this mode
    /// prove nothing. Callers must surface the mode to operators.
    pub fn insecure_dev() -> Self {
        Self {
            key: SealSecret(DEV_SECRET.to_vec()),
            dev_mode: true,
        }
    }

    /// Whether this sealer runs on the development secret.
    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.key.0).expect("hmac key length")
    }

    /// Compute the hex-encoded tag over the payload.
    pub fn seal(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a stored hex tag against a fresh recomputation.
    ///
    /// Comparison is constant-time over the raw MAC bytes; a tag that does
    /// not decode or has the wrong length fails without further inspection.
    pub fn verify(&self, payload: &[u8], tag: &str) -> bool {
        let Ok(given) = hex::decode(tag) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload);
        let fresh = mac.finalize().into_bytes();
        if given.len() != fresh.len() {
            return false;
        }
        fresh.ct_eq(given.as_slice()).into()
    }
}
