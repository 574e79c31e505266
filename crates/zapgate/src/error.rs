//! Workflow error taxonomy shared by the session manager and dispatcher.

use thiserror::Error;

use crate::client::ClientError;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Input problems caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing instance")]
    MissingInstance,

    #[error("missing credential")]
    MissingCredential,

    #[error("missing recipient")]
    MissingRecipient,

    #[error("missing message body")]
    MissingBody,

    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),
}

/// Errors surfaced by session and dispatch operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Rejected before reaching the network.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Gateway could not be reached.
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// Gateway answered with a failure status or a failed reply body.
    #[error("gateway rejected request: {message}")]
    Gateway { status: Option<u16>, message: String },

    /// QR countdown ran out before the instance connected.
    #[error("connection timed out after {seconds}s without pairing")]
    StateTimeout { seconds: u64 },

    /// The session manager was disposed.
    #[error("session manager has been disposed")]
    Disposed,
}

impl WorkflowError {
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }
}

impl From<ClientError> for WorkflowError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => WorkflowError::Transport(e.to_string()),
            ClientError::Api { status, message } => WorkflowError::Gateway {
                status: Some(status),
                message,
            },
            ClientError::Decode(e) => WorkflowError::Gateway {
                status: None,
                message: format!("invalid reply: {e}"),
            },
        }
    }
}
