//! Wire types for the scriptgate API surface.

pub mod envelope;
pub mod ops;
pub mod status;

pub use envelope::{ApiRequest, ApiResponse};
pub use status::{ApiError, StatusCode};
