//! Error types for the auth client.
//!
//! Expected runtime failures are not errors here: they travel as
//! [`ErrorPayload`](auth_machine::ErrorPayload) inside each operation's result.
//! [`ClientError`] is reserved for misuse and setup problems.

use auth_machine::error::OTHER_ERROR_STATUS;
use auth_machine::{ErrorPayload, MachineError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the auth client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The session machine has not been started.
    #[error("Auth client is not initialized: the session machine has not been started")]
    NotInitialized,

    /// Bootstrap did not settle in time.
    #[error("The state machine is not yet ready after {} seconds", waited.as_secs())]
    ReadinessTimeout { waited: Duration },

    /// Deanonymization method or connection not supported.
    #[error("Unknown deanonymization method: {method}")]
    UnknownDeanonymizationMethod { method: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session machine error
    #[error("Session machine error: {0}")]
    Machine(#[from] MachineError),
}

impl ClientError {
    /// Data form of this error, for operations that report failures in
    /// their result instead of raising them.
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            ClientError::ReadinessTimeout { waited } => ErrorPayload::readiness_timeout(*waited),
            ClientError::NotInitialized => {
                ErrorPayload::new(OTHER_ERROR_STATUS, "not-initialized", self.to_string())
            }
            ClientError::UnknownDeanonymizationMethod { .. } => ErrorPayload::new(
                OTHER_ERROR_STATUS,
                "unknown-deanonymization-method",
                self.to_string(),
            ),
            _ => ErrorPayload::new(OTHER_ERROR_STATUS, "client-error", self.to_string()),
        }
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
