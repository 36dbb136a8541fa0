//! Error types for the PixelMill client.

use thiserror::Error;

/// Result type for PixelMill client operations.
pub type Result<T> = std::result::Result<T, PixelmillError>;

/// PixelMill client errors.
#[derive(Debug, Error)]
pub enum PixelmillError {
    /// Configuration error (missing API token, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure (connection refused, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the API, with the raw response body
    #[error("PixelMill API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response whose body does not match the documented shape
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PixelmillError {
    /// True when the API reported the resource as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PixelmillError::Api { status: 404, .. })
    }
}
