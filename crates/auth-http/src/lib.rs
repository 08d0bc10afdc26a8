//! # Auth HTTP
//!
//! `reqwest` transport for the hasura-auth REST endpoints. [`HttpAuthBackend`]
//! implements [`AuthBackend`](auth_machine::AuthBackend), so it plugs straight
//! into the session machine.
//!
//! Rejections come back as the backend's own `{ status, error, message }`
//! payload. Transport failures become network errors (status `0`) so the
//! machine can tell a revoked token from an unreachable server.

mod client;
mod wire;

pub use client::{HttpAuthBackend, DEFAULT_REQUEST_TIMEOUT};

use thiserror::Error;

/// Errors raised while constructing the transport.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Result type alias using HttpError.
pub type HttpResult<T> = Result<T, HttpError>;
