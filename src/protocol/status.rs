//! Status code registry for API responses.
//!
//! Codes are stable strings used for automation. Integrity and storage
//! failures deliberately carry a generic client message; operator detail
//! goes to stderr, never over the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable status codes returned in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Malformed request, missing fields, or invalid field values.
    InvalidRequest,
    /// Role or assertion violation (expired assertion, guest ceiling).
    NotAuthorized,
    /// Fetch key resolves to no record.
    Forbidden,
    /// The record's expiry has passed.
    Gone,
    /// Cooldown window not yet elapsed; retry later.
    TooManyRequests,
    /// Server-side integrity anomaly. Never client-correctable.
    IntegrityFailure,
    /// Lookup key collides with a live record.
    Conflict,
    /// Record not found.
    NotFound,
    /// Record is owned by another principal.
    NotOwner,
    /// Upload-time transformation failed.
    TransformFailed,
    /// Durable store unavailable; the caller may retry.
    StorageError,
    /// Unknown operation requested.
    UnknownOperation,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::NotAuthorized => write!(f, "NOT_AUTHORIZED"),
            Self::Forbidden => write!(f, "FORBIDDEN"),
            Self::Gone => write!(f, "GONE"),
            Self::TooManyRequests => write!(f, "TOO_MANY_REQUESTS"),
            Self::IntegrityFailure => write!(f, "INTEGRITY_FAILURE"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::NotOwner => write!(f, "NOT_OWNER"),
            Self::TransformFailed => write!(f, "TRANSFORM_FAILED"),
            Self::StorageError => write!(f, "STORAGE_ERROR"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
        }
    }
}

/// API error response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Code from the registry.
    pub code: StatusCode,
    /// Human-readable, single-line message. Must not contain secrets or
    /// internal detail.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new error.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new error with additional data.
    pub fn with_data(code: StatusCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidRequest, message)
    }

    /// Create a NOT_AUTHORIZED error.
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotAuthorized, message)
    }

    /// Create a FORBIDDEN error for an unauthorized fetch.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::Forbidden, "unauthorized access")
    }

    /// Create a GONE error.
    pub fn gone() -> Self {
        Self::new(StatusCode::Gone, "artifact expired")
    }

    /// Create a TOO_MANY_REQUESTS error.
    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TooManyRequests, "rate limit exceeded")
    }

    /// Create an INTEGRITY_FAILURE error. The message is deliberately
    /// generic; detail stays server-side.
    pub fn integrity_failure() -> Self {
        Self::new(StatusCode::IntegrityFailure, "integrity check failed")
    }

    /// Create a CONFLICT error for a colliding lookup key.
    pub fn conflict(key: &str) -> Self {
        Self::with_data(
            StatusCode::Conflict,
            format!("lookup key '{}' is already in use", key),
            serde_json::json!({ "key": key }),
        )
    }

    /// Create a NOT_FOUND error.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound, "record not found")
    }

    /// Create a NOT_OWNER error.
    pub fn not_owner() -> Self {
        Self::new(StatusCode::NotOwner, "record is owned by another principal")
    }

    /// Create a TRANSFORM_FAILED error.
    pub fn transform_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TransformFailed, message)
    }

    /// Create a STORAGE_ERROR error. Generic by design; the caller may
    /// retry, the core never does.
    pub fn storage_error() -> Self {
        Self::new(StatusCode::StorageError, "storage unavailable, retry later")
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            StatusCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
