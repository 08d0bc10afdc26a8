//! Turns a fire-and-forget machine event into an awaited outcome.
//!
//! The observer is attached before the event is sent, so no transition can
//! slip between the send and the wait. Only snapshots committed after the
//! event's own snapshot are considered.

use auth_machine::{AuthEvent, AuthMachine, Snapshot, Subscription};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Outcome of [`send_and_await`].
#[derive(Debug)]
pub(crate) enum Correlation {
    /// The machine did not accept the event. Carries the snapshot current at
    /// the time of the send.
    Rejected(Arc<Snapshot>),
    /// First later snapshot satisfying the predicate.
    Settled(Arc<Snapshot>),
    /// The bound elapsed first.
    TimedOut,
    /// The observer was detached before anything settled.
    Detached,
}

/// Detaches its subscription when dropped, including on timeout or when the
/// awaiting future is dropped.
pub(crate) struct ObserverGuard(Subscription);

impl ObserverGuard {
    pub(crate) fn new(subscription: Subscription) -> Self {
        Self(subscription)
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// Send `event` and wait for the first subsequent snapshot matching `settled`.
pub(crate) async fn send_and_await<F>(
    machine: &AuthMachine,
    event: AuthEvent,
    settled: F,
    bound: Option<Duration>,
) -> Correlation
where
    F: Fn(&Snapshot) -> bool,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Snapshot>>();
    let _guard = ObserverGuard::new(machine.subscribe(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    }));

    let kind = event.kind();
    let outcome = machine.send(event);
    if !outcome.changed {
        debug!(event = %kind, "Event rejected by session machine");
        return Correlation::Rejected(machine.snapshot());
    }

    let wait = async {
        while let Some(snapshot) = rx.recv().await {
            if snapshot.sequence > outcome.sequence && settled(&snapshot) {
                return Correlation::Settled(snapshot);
            }
        }
        Correlation::Detached
    };

    match bound {
        Some(bound) => tokio::time::timeout(bound, wait)
            .await
            .unwrap_or(Correlation::TimedOut),
        None => wait.await,
    }
}
