//! Client error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors surfaced to callers of the client.
///
/// Variants carry strings rather than sources so the error can be cloned
/// into [`crate::SyncUpdate`]s and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Missing, expired or rejected token. Ends the session.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Timeout, connection failure or server-side error. Not retried
    /// automatically for fetches.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// The requested user or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server sent something we could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller passed something unusable (e.g. an empty message).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted session could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Whether this error ends the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Map a non-success HTTP status to the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        use reqwest::StatusCode;

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::Auth(format!("{context}: {status}"))
            }
            StatusCode::NOT_FOUND => Self::NotFound(context.to_string()),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Self::TransientNetwork(format!("{context}: {status}"))
            }
            s if s.is_server_error() => Self::TransientNetwork(format!("{context}: {status}")),
            _ => Self::Protocol(format!("{context}: unexpected status {status}")),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::TransientNetwork(err.to_string())
        }
    }
}

impl From<ConfigError> for ChatError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        Self::TransientNetwork(err.to_string())
    }
}
