//! Errors from the Aido backend HTTP surface.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection, timeout, or mid-body transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status. The body is carried
    /// verbatim so callers can surface the server's own message.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not parse as the expected JSON shape.
    #[error("Failed to parse backend response: {0}")]
    Json(#[from] serde_json::Error),
}
