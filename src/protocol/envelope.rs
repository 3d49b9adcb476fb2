//! Request/response envelopes.
//!
//! The serve loop accepts one JSON request per line on stdin and emits one
//! JSON response per line on stdout. Transport framing beyond that is the
//! deployment's concern.

use serde::{Deserialize, Serialize};

use super::status::ApiError;

/// API request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Operation name (see [`super::ops::names`]).
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    pub payload: serde_json::Value,
}

/// API response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Request ID echoed from the request.
    pub request_id: String,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Success payload (present when ok=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error details (present when ok=false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ApiResponse {
    /// Create a success response.
    pub fn success(request_id: String, payload: serde_json::Value) -> Self {
        Self {
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(request_id: String, error: ApiError) -> Self {
        Self {
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_round_trip() {
        let resp = ApiResponse::success("r1".to_string(), serde_json::json!({ "id": "abc" }));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"ok\":true"));
        assert!(!json.contains("\"error\""));

        let parsed: ApiResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, "r1");
        assert!(parsed.ok);
    }

    #[test]
    fn test_error_response_shape() {
        let resp = ApiResponse::error("r2".to_string(), ApiError::not_found());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"ok\":false"));
        assert!(json.contains("\"NOT_FOUND\""));
        assert!(!json.contains("\"payload\""));
    }
}
