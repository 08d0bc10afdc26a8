//! Listener registry for token and authentication-state changes.
//!
//! Listeners registered before the machine starts are attached by a start
//! hook. Their handle cannot detach them, since no subscription exists yet
//! when it is handed out.

use auth_machine::{AuthEventKind, AuthMachine, Session, Snapshot, Subscription};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Called with the new session after every token refresh.
pub type TokenChangedListener = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// Called on every sign-in and sign-out.
pub type AuthStateListener = Arc<dyn Fn(AuthChangeEvent, Option<Session>) + Send + Sync>;

/// Authentication change reported to [`AuthStateListener`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
}

impl AuthChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthChangeEvent::SignedIn => "SIGNED_IN",
            AuthChangeEvent::SignedOut => "SIGNED_OUT",
        }
    }

    fn from_kind(kind: AuthEventKind) -> Option<Self> {
        match kind {
            AuthEventKind::SignedIn => Some(AuthChangeEvent::SignedIn),
            AuthEventKind::SignedOut => Some(AuthChangeEvent::SignedOut),
            _ => None,
        }
    }
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by listener registration.
#[derive(Debug)]
pub enum Unsubscribe {
    Attached(Subscription),
    /// Registered before start; cannot be detached.
    Deferred { listener: &'static str },
}

impl Unsubscribe {
    /// Detach the listener. Returns false when it was already detached or
    /// was registered before the machine started.
    pub fn unsubscribe(&self) -> bool {
        match self {
            Unsubscribe::Attached(subscription) => subscription.unsubscribe(),
            Unsubscribe::Deferred { listener } => {
                warn!(
                    listener = *listener,
                    "Listener was registered before the machine started and cannot be unsubscribed"
                );
                false
            }
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Unsubscribe::Deferred { .. })
    }
}

fn register<F>(machine: &AuthMachine, listener: &'static str, observer: F) -> Unsubscribe
where
    F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
{
    if machine.is_started() {
        return Unsubscribe::Attached(machine.subscribe(observer));
    }

    debug!(listener, "Machine not started, deferring listener");
    machine.on_start(Box::new(move |machine: &AuthMachine| {
        // Pre-start registrations have no handle to detach them with
        let _ = machine.subscribe(observer);
    }));
    Unsubscribe::Deferred { listener }
}

pub fn on_token_changed(machine: &AuthMachine, listener: TokenChangedListener) -> Unsubscribe {
    register(machine, "token-changed", move |snapshot| {
        if snapshot.event == AuthEventKind::TokenChanged {
            listener(snapshot.session());
        }
    })
}

pub fn on_auth_state_changed(machine: &AuthMachine, listener: AuthStateListener) -> Unsubscribe {
    register(machine, "auth-state-changed", move |snapshot| {
        if let Some(event) = AuthChangeEvent::from_kind(snapshot.event) {
            listener(event, snapshot.session());
        }
    })
}
