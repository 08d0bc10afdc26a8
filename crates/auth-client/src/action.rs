//! Single-request actions that never touch the session.
//!
//! Password reset, password change, verification resend and email change
//! each start a fresh rust-fsm machine per call:
//!
//! ```text
//! Idle ──Request──► Requesting ──Succeed──► Succeeded
//!                        │                      │
//!                        └──Fail──► Failed      │
//!                                     └──Request┴──► Requesting
//! ```
//!
//! The session machine is only read, for the access token the change
//! operations authenticate with.

use crate::flows::{is_valid_email, is_valid_password};
use crate::response::ActionResponse;
use auth_machine::{AuthBackend, AuthMachine, AuthOptions, BackendResult, ErrorPayload};
use parking_lot::Mutex;
use rust_fsm::*;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub action_request(Idle)

    Idle => {
        Request => Requesting
    },
    Requesting => {
        Succeed => Succeeded,
        Fail => Failed
    },
    Succeeded => {
        Request => Requesting
    },
    Failed => {
        Request => Requesting
    }
}

pub use action_request::Input as ActionInput;
pub use action_request::State as ActionState;

/// One action machine. Concurrent requests on the same machine are refused,
/// and a request abandoned mid-flight leaves it `Failed`.
#[derive(Debug)]
pub struct ActionMachine {
    name: &'static str,
    state: Mutex<ActionState>,
    error: Mutex<Option<ErrorPayload>>,
}

impl ActionMachine {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(ActionState::Idle),
            error: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ActionState {
        *self.state.lock()
    }

    /// Error of the last failed request, cleared when a new one starts.
    pub fn error(&self) -> Option<ErrorPayload> {
        self.error.lock().clone()
    }

    fn step(&self, input: ActionInput) -> bool {
        let mut state = self.state.lock();
        match action_request::Impl::transition(&state, &input) {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        }
    }

    /// Run `request` through the machine and report how it ended.
    pub async fn run<F>(&self, request: F) -> ActionResponse
    where
        F: Future<Output = BackendResult<()>>,
    {
        if !self.step(ActionInput::Request) {
            debug!(action = self.name, "Action already requesting");
            return ActionResponse::failed(ErrorPayload::new(
                auth_machine::error::OTHER_ERROR_STATUS,
                "action-in-progress",
                format!("A {} request is already running", self.name),
            ));
        }
        *self.error.lock() = None;
        let mut pending = PendingRequest {
            machine: self,
            settled: false,
        };

        let result = request.await;
        pending.settled = true;
        match result {
            Ok(()) => {
                self.step(ActionInput::Succeed);
                ActionResponse::ok()
            }
            Err(error) => {
                warn!(action = self.name, error = %error, "Action failed");
                *self.error.lock() = Some(error.clone());
                self.step(ActionInput::Fail);
                ActionResponse::failed(error)
            }
        }
    }
}

/// Leaves `Requesting` when the caller drops a request before it settles.
struct PendingRequest<'a> {
    machine: &'a ActionMachine,
    settled: bool,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(action = self.machine.name, "Action abandoned");
            self.machine.step(ActionInput::Fail);
        }
    }
}

fn access_token(machine: &AuthMachine) -> Option<String> {
    let snapshot = machine.snapshot();
    if !snapshot.matches("authentication.signedIn") {
        return None;
    }
    snapshot.context.access_token.value.clone()
}

pub async fn reset_password(
    backend: &Arc<dyn AuthBackend>,
    email: &str,
    options: &AuthOptions,
) -> ActionResponse {
    if !is_valid_email(email) {
        return ActionResponse::failed(ErrorPayload::invalid_email());
    }
    ActionMachine::new("reset-password")
        .run(backend.reset_password(email, options))
        .await
}

/// Needs a signed-in session; its access token authenticates the request.
pub async fn change_password(machine: &AuthMachine, new_password: &str) -> ActionResponse {
    if !is_valid_password(new_password) {
        return ActionResponse::failed(ErrorPayload::invalid_password());
    }
    let Some(token) = access_token(machine) else {
        return ActionResponse::failed(ErrorPayload::unauthenticated());
    };
    ActionMachine::new("change-password")
        .run(machine.backend().change_password(&token, new_password))
        .await
}

pub async fn send_verification_email(
    backend: &Arc<dyn AuthBackend>,
    email: &str,
    options: &AuthOptions,
) -> ActionResponse {
    if !is_valid_email(email) {
        return ActionResponse::failed(ErrorPayload::invalid_email());
    }
    ActionMachine::new("send-verification-email")
        .run(backend.send_verification_email(email, options))
        .await
}

pub async fn change_email(
    machine: &AuthMachine,
    new_email: &str,
    options: &AuthOptions,
) -> ActionResponse {
    if !is_valid_email(new_email) {
        return ActionResponse::failed(ErrorPayload::invalid_email());
    }
    let Some(token) = access_token(machine) else {
        return ActionResponse::failed(ErrorPayload::unauthenticated());
    };
    ActionMachine::new("change-email")
        .run(machine.backend().change_email(&token, new_email, options))
        .await
}
