//! Error types for the session machine.
//!
//! Two layers exist side by side:
//! - [`ErrorPayload`] is data. It travels inside machine context and inside
//!   every action result, exactly as the identity backend reported it.
//! - [`MachineError`] is raised when the machine itself is misused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Status used for errors that never reached the backend (transport failures).
pub const NETWORK_ERROR_STATUS: u16 = 0;

/// Status used for client-side errors that are not HTTP responses.
pub const OTHER_ERROR_STATUS: u16 = 1;

/// Error reported by the identity backend or synthesized by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// HTTP status, or one of the synthetic statuses above.
    pub status: u16,
    /// Stable machine-readable code, e.g. `invalid-refresh-token`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    /// Transport failure; the request may be retried.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NETWORK_ERROR_STATUS, "network-error", message)
    }

    pub fn no_refresh_token() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "no-refresh-token",
            "No refresh token has been provided",
        )
    }

    pub fn invalid_refresh_token() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "invalid-refresh-token",
            "Invalid or expired refresh token",
        )
    }

    pub fn refresher_already_running() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "refresher-already-running",
            "The token refresher is already running. You must wait until it has finished before submitting a new token.",
        )
    }

    /// A sign-out reset the token region before the refresh came back.
    pub fn refresh_interrupted() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "refresh-interrupted",
            "The session was signed out while the token was being refreshed",
        )
    }

    pub fn email_needs_verification() -> Self {
        Self::new(401, "unverified-user", "Email needs verification")
    }

    pub fn already_signed_in() -> Self {
        Self::new(400, "already-signed-in", "User is already signed in")
    }

    /// Another credential flow or a sign-out is still running.
    pub fn authentication_in_progress() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "authentication-in-progress",
            "Another authentication request is still running",
        )
    }

    pub fn unauthenticated() -> Self {
        Self::new(401, "unauthenticated-user", "User is not authenticated")
    }

    pub fn invalid_email() -> Self {
        Self::new(OTHER_ERROR_STATUS, "invalid-email", "Email is incorrectly formatted")
    }

    pub fn invalid_password() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "invalid-password",
            "Password is incorrectly formatted",
        )
    }

    pub fn invalid_phone_number() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "invalid-phone-number",
            "Phone number is incorrectly formatted",
        )
    }

    pub fn no_mfa_ticket() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "no-mfa-ticket",
            "No MFA ticket has been provided",
        )
    }

    pub fn readiness_timeout(waited: Duration) -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "readiness-timeout",
            format!(
                "The state machine is not yet ready after {} seconds.",
                waited.as_secs()
            ),
        )
    }

    pub fn refresh_timeout(waited: Duration) -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "refresh-timeout",
            format!("Token refresh did not settle within {} seconds", waited.as_secs()),
        )
    }

    /// The machine went away while a caller was still waiting on it.
    pub fn detached() -> Self {
        Self::new(
            OTHER_ERROR_STATUS,
            "machine-detached",
            "The session machine stopped before the action settled",
        )
    }

    /// Returns true if this error came from the transport rather than the backend.
    pub fn is_network(&self) -> bool {
        self.status == NETWORK_ERROR_STATUS
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error, self.status, self.message)
    }
}

/// Raised when the machine cannot do what was asked of it.
#[derive(Error, Debug)]
pub enum MachineError {
    /// `start` was called outside of a Tokio runtime.
    #[error("Session machine must be started from within a Tokio runtime")]
    NoRuntime,
}

/// Result type alias using MachineError.
pub type MachineResult<T> = Result<T, MachineError>;
