//! Gateway client error types.

use thiserror::Error;

/// Result type for gateway client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when calling the messaging gateway.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request never produced a response (DNS, connect, timeout, TLS).
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-success status.
    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Gateway answered 2xx with a body that is not the expected JSON.
    #[error("invalid gateway reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// True for failures where the gateway was never reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_))
    }

    /// HTTP status for gateway-side failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
