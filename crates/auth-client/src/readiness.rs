//! Readiness gate: hands out the session machine once bootstrap has settled.

use crate::config::DEFAULT_READY_TIMEOUT_SECS;
use crate::correlator::ObserverGuard;
use crate::{ClientError, ClientResult};
use auth_machine::AuthMachine;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default bound on how long callers wait for bootstrap.
pub const READY_TIMEOUT: Duration = Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS);

/// Wait until the current snapshot no longer carries the `loading` tag.
///
/// Returns at once when the machine is already settled. Fails with
/// [`ClientError::NotInitialized`] when the machine has not been started and
/// with [`ClientError::ReadinessTimeout`] once `bound` elapses. The observer
/// used for waiting is detached on every path.
pub async fn wait_until_ready(machine: &AuthMachine, bound: Duration) -> ClientResult<AuthMachine> {
    if !machine.is_started() {
        return Err(ClientError::NotInitialized);
    }
    if !machine.snapshot().is_loading() {
        return Ok(machine.clone());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
    let _guard = ObserverGuard::new(machine.subscribe(move |snapshot| {
        if !snapshot.is_loading() {
            let _ = tx.send(snapshot.sequence);
        }
    }));

    // Settled between the first check and the subscription
    let current = machine.snapshot();
    if !current.is_loading() {
        return Ok(machine.clone());
    }

    debug!(
        state = %current.value.authentication.path(),
        "Waiting for session machine to settle"
    );
    let settled = tokio::time::timeout(bound, async {
        while let Some(sequence) = rx.recv().await {
            // Ignore stale deliveries queued before the loading snapshot
            if sequence > current.sequence {
                return true;
            }
        }
        false
    })
    .await;

    match settled {
        Ok(true) => Ok(machine.clone()),
        Ok(false) | Err(_) => {
            warn!(
                waited_secs = bound.as_secs(),
                "Session machine did not settle in time"
            );
            Err(ClientError::ReadinessTimeout { waited: bound })
        }
    }
}
