//! # Auth client
//!
//! Client-side orchestration for a hasura-auth backend. One
//! [`HasuraAuthClient`] owns one session machine and exposes the public
//! operations on top of it.
//!
//! ## Architecture
//!
//! ```text
//! public call → readiness gate → sign-in dispatch → correlator → result
//!                    │                                   │
//!                    └──────────── session machine ──────┘
//!                                        │
//!                                        └→ listeners (token / auth state)
//! ```
//!
//! Operations wait until bootstrap has settled (bounded, 15 seconds by
//! default), send one event, and resolve with the first later snapshot that
//! answers it. Expected failures are returned in the result's `error` field;
//! only integration mistakes are raised as [`ClientError`].
//!
//! ## Crate Structure
//!
//! - [`client`] - The client facade
//! - [`readiness`] - Readiness gate
//! - [`signin`] - Sign-in parameter shapes and routing
//! - [`flows`] - Credential flows against the session machine
//! - [`refresh`] - Token refresh arbiter
//! - [`listeners`] - Token and auth-state listeners
//! - [`action`] - Single-request action machines
//! - [`config`] - Configuration
//! - [`jwt`] - Access-token claim decoding
//! - [`provider`] - External-provider URLs and the host environment
//! - [`logging`] - Tracing subscriber setup

pub mod action;
pub mod client;
pub mod config;
mod correlator;
pub mod error;
pub mod flows;
pub mod jwt;
pub mod listeners;
pub mod logging;
pub mod provider;
pub mod readiness;
pub mod refresh;
pub mod response;
pub mod signin;

#[cfg(test)]
mod tests;

pub use client::HasuraAuthClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use jwt::{HasuraClaim, JwtClaims, HASURA_CLAIMS_NAMESPACE};
pub use listeners::{AuthChangeEvent, AuthStateListener, TokenChangedListener, Unsubscribe};
pub use logging::init_logging;
pub use provider::{Environment, Headless};
pub use readiness::READY_TIMEOUT;
pub use response::{
    ActionResponse, AuthenticationStatus, ProviderRedirect, RefreshResponse, SignInResponse,
    SignUpResponse,
};
pub use signin::{DeanonymizeParams, SignInParams, SignInRoute};

pub use auth_machine::{AuthOptions, ErrorPayload, MfaChallenge, Session, User};
