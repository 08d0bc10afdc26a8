//! Integration tests for the session machine.
//!
//! - `bootstrap.rs` - Start-up, stored-token restore, start hooks
//! - `flows.rs`     - Credential flows, sign-out, deanonymization
//! - `refresh.rs`   - Token region, single-flight refresh, refresh timer
//! - `ordering.rs`  - Snapshot sequencing and observer delivery

mod flows;
mod ordering;

use crate::testing::ScriptedBackend;
use crate::{AuthMachine, MachineOptions, MemoryTokenStore, Snapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Harness {
    pub machine: AuthMachine,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryTokenStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            ScriptedBackend::new(),
            MemoryTokenStore::new(),
            MachineOptions::default(),
        )
    }

    pub fn with(backend: ScriptedBackend, store: MemoryTokenStore, options: MachineOptions) -> Self {
        let backend = Arc::new(backend);
        let store = Arc::new(store);
        let machine = AuthMachine::new(backend.clone(), store.clone(), options);
        Self {
            machine,
            backend,
            store,
        }
    }

    /// Start the machine and wait for the authentication region to settle.
    pub async fn start(&self) -> Arc<Snapshot> {
        self.machine.start().unwrap();
        wait_until(&self.machine, |s| !s.is_loading()).await
    }
}

/// Wait for the first snapshot (current or future) satisfying `predicate`.
pub(crate) async fn wait_until<F>(machine: &AuthMachine, predicate: F) -> Arc<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription = machine.subscribe(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    });

    let current = machine.snapshot();
    if predicate(&current) {
        subscription.unsubscribe();
        return current;
    }

    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snapshot) = rx.recv().await {
            if predicate(&snapshot) {
                return snapshot;
            }
        }
        panic!("observer channel closed");
    })
    .await
    .expect("machine did not reach the expected state");

    subscription.unsubscribe();
    found
}

/// Record every snapshot delivered from now on.
pub(crate) fn record(machine: &AuthMachine) -> Arc<Mutex<Vec<Arc<Snapshot>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    // Never detached; lives as long as the machine
    let _subscription = machine.subscribe(move |snapshot| sink.lock().push(snapshot.clone()));
    seen
}
