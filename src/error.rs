//! Error taxonomy for talking to the job service.

use thiserror::Error;

/// Broad classification used when deciding how a failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced a response (connect, timeout, TLS...).
    NetworkFailure,
    /// The service answered with a non-2xx status, `success: false`, or a body we
    /// could not make sense of.
    ServerRejected,
    /// Caught on the client before anything was sent.
    ValidationFailure,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Reqwest error, typically a connection failure or timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Input rejected before it reached the service.
    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Network(e) if e.is_decode() => ErrorKind::ServerRejected,
            ClientError::Network(_) => ErrorKind::NetworkFailure,
            ClientError::Rejected { .. } | ClientError::Malformed(_) => ErrorKind::ServerRejected,
            ClientError::Validation(_) => ErrorKind::ValidationFailure,
        }
    }

    /// Message suitable for a notice: the server's own reason when it gave one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Rejected { message, .. } => message.clone(),
            ClientError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}
