//! API response types for HTTP handlers.

use serde::Serialize;

/// Prometheus API style error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    /// Always "error"
    pub status: &'a str,
    /// Error class (`bad_data`, `internal`, `timeout`)
    #[serde(rename = "errorType")]
    pub error_type: &'a str,
    /// Error message, the verbatim cause
    pub error: String,
}

impl<'a> ErrorResponse<'a> {
    /// Create an error body of the given type.
    pub fn new(error_type: &'a str, error: impl Into<String>) -> Self {
        Self { status: "error", error_type, error: error.into() }
    }
}
