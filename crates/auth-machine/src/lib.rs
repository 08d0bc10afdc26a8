//! # Auth machine
//!
//! Session state machine behind the hasura-auth client. It tracks who is
//! signed in, runs credential exchanges against the identity backend, and
//! keeps the access token fresh.
//!
//! ## Architecture
//!
//! ```text
//! send(event) → region FSMs → snapshot → observers (commit order)
//!                                  │
//!                                  └→ effects: backend call / persist / refresh timer
//!                                                   │
//!                                                   └→ send(result event)
//! ```
//!
//! Two regions run side by side: `authentication` (starting, signed out,
//! authenticating, signed in, signing out) and `token` (idle, running,
//! error). The `loading` tag is present until the authentication region
//! settles.
//!
//! ## Crate Structure
//!
//! - [`fsm`] - Region transition tables and state views
//! - [`event`] - Events and their kinds
//! - [`snapshot`] - Immutable snapshots and machine context
//! - [`backend`] - Identity endpoint seam
//! - [`storage`] - Refresh-token persistence seam
//! - [`types`] - Users, sessions, options

pub mod backend;
pub mod error;
pub mod event;
pub mod fsm;
mod interpreter;
pub mod snapshot;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use backend::{AuthBackend, BackendResult};
pub use error::{ErrorPayload, MachineError, MachineResult};
pub use event::{AuthEvent, AuthEventKind};
pub use fsm::{AuthFlow, AuthenticationState, SignedOutReason, StateValue, TokenState};
pub use interpreter::{
    AuthMachine, MachineOptions, Observer, SendOutcome, StartHook, Subscription,
    DEFAULT_REFRESH_MARGIN, DEFAULT_REFRESH_RETRY,
};
pub use snapshot::{AuthContext, Snapshot, LOADING_TAG};
pub use storage::{MemoryTokenStore, StorageError, StorageResult, TokenStore, REFRESH_TOKEN_KEY};
pub use types::{AuthOptions, DeanonymizeRequest, MfaChallenge, Session, SignInOutcome, User};
