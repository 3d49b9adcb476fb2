//! Identity assertions and the external identity-provider boundary.
//!
//! The core never sees raw credentials or token bytes. An external identity
//! provider authenticates the caller and hands over a decoded, already
//! verified assertion; everything in this crate consumes only that shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role carried by an identity assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Default role; subject to the expiry ceiling on uploads.
    Guest,
    /// May list and export across all owners.
    Admin,
}

/// Decoded identity assertion supplied by the external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated principal name.
    pub principal: String,
    /// Asserted role.
    pub role: Role,
    /// Instant after which the assertion is no longer valid.
    pub valid_until: DateTime<Utc>,
}

impl Identity {
    /// Whether the assertion is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    /// Whether the assertion carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Errors from the identity provider boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// External identity provider.
///
/// Implementations own credential storage and token issuance; the core only
/// depends on the resulting assertion.
pub trait IdentityProvider {
    /// Authenticate a principal and return its assertion.
    fn authenticate(&self, principal: &str, secret: &str) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity(role: Role, valid_for: Duration) -> Identity {
        Identity {
            principal: "alice".to_string(),
            role,
            valid_until: Utc::now() + valid_for,
        }
    }

    #[test]
    fn test_validity_window() {
        let id = identity(Role::Guest, Duration::hours(1));
        assert!(id.is_valid_at(Utc::now()));
        assert!(!id.is_valid_at(id.valid_until));
        assert!(!id.is_valid_at(id.valid_until + Duration::seconds(1)));
    }

    #[test]
    fn test_role_checks() {
        assert!(!identity(Role::Guest, Duration::hours(1)).is_admin());
        assert!(identity(Role::Admin, Duration::hours(1)).is_admin());
    }

    #[test]
    fn test_provider_boundary() {
        // Stand-in for the external provider: one known principal.
        struct FixedProvider;
        impl IdentityProvider for FixedProvider {
            fn authenticate(&self, principal: &str, secret: &str) -> Result<Identity, AuthError> {
                if principal == "alice" && secret == "hunter2" {
                    Ok(Identity {
                        principal: principal.to_string(),
                        role: Role::Guest,
                        valid_until: Utc::now() + Duration::hours(1),
                    })
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
        }

        let provider = FixedProvider;
        assert!(provider.authenticate("alice", "hunter2").is_ok());
        assert!(matches!(
            provider.authenticate("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_role_serialization() {
        let id = identity(Role::Admin, Duration::hours(1));
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains("\"role\":\"admin\""));

        let parsed: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
