//! Token refresh arbiter.
//!
//! At most one refresh runs per machine. A second caller is refused by the
//! token region and fails fast with `refresher-already-running`; it is
//! never queued. A sign-out while the refresh is in flight ends it with
//! `refresh-interrupted`.

use crate::correlator::{send_and_await, Correlation};
use crate::response::RefreshResponse;
use auth_machine::{AuthEvent, AuthEventKind, AuthMachine, ErrorPayload};
use std::time::Duration;
use tracing::{debug, info};

/// Refresh the session with `token`, or with the machine's own refresh token
/// when no non-empty override is given.
pub async fn refresh_session(
    machine: &AuthMachine,
    token: Option<&str>,
    bound: Duration,
) -> RefreshResponse {
    let token = match token.filter(|t| !t.is_empty()) {
        Some(token) => token.to_string(),
        None => match machine.snapshot().context.refresh_token.value.clone() {
            Some(token) => token,
            None => {
                debug!("No refresh token available, nothing sent");
                return RefreshResponse::failed(ErrorPayload::no_refresh_token());
            }
        },
    };

    let settled = |s: &auth_machine::Snapshot| !s.matches("token.running");
    match send_and_await(machine, AuthEvent::TryToken { token }, settled, Some(bound)).await {
        Correlation::Rejected(_) => {
            debug!("Refresh refused, another one is running");
            RefreshResponse::failed(ErrorPayload::refresher_already_running())
        }
        Correlation::Settled(snapshot) if snapshot.event == AuthEventKind::TokenChanged => {
            info!("Session refreshed");
            RefreshResponse {
                session: snapshot.session(),
                error: None,
            }
        }
        Correlation::Settled(snapshot) if snapshot.matches("token.idle.error") => {
            RefreshResponse::failed(ErrorPayload::invalid_refresh_token())
        }
        Correlation::Settled(snapshot) => {
            debug!(event = %snapshot.event, "Refresh interrupted");
            RefreshResponse::failed(ErrorPayload::refresh_interrupted())
        }
        Correlation::TimedOut => RefreshResponse::failed(ErrorPayload::refresh_timeout(bound)),
        Correlation::Detached => RefreshResponse::failed(ErrorPayload::detached()),
    }
}
