//! Integration tests for the auth client.
//!
//! - `dispatch.rs`  - Sign-in routing, flow outcomes, deanonymization
//! - `readiness.rs` - Readiness gate bound and misuse
//! - `refresh.rs`   - Refresh arbiter
//! - `listeners.rs` - Pre- and post-start listeners
//! - `session.rs`   - Session projection, claims, status
//! - `actions.rs`   - Password and email actions, sign-out

mod actions;

use crate::{ClientConfig, Environment, HasuraAuthClient};
use auth_machine::testing::ScriptedBackend;
use auth_machine::{AuthMachine, MemoryTokenStore, Snapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const BACKEND_URL: &str = "https://auth.example.com/v1";

/// Environment double that records navigations.
#[derive(Default)]
pub(crate) struct RecordingEnvironment {
    pub browser: bool,
    pub visited: Mutex<Vec<String>>,
}

impl Environment for RecordingEnvironment {
    fn is_browser(&self) -> bool {
        self.browser
    }

    fn navigate(&self, url: &str) {
        self.visited.lock().push(url.to_string());
    }
}

pub(crate) fn config() -> ClientConfig {
    ClientConfig {
        backend_url: BACKEND_URL.to_string(),
        client_url: Some("https://app.example.com".to_string()),
        ..ClientConfig::default()
    }
}

pub(crate) struct Harness {
    pub client: Arc<HasuraAuthClient>,
    pub backend: Arc<ScriptedBackend>,
    pub environment: Arc<RecordingEnvironment>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ScriptedBackend::new(), MemoryTokenStore::new(), config())
    }

    pub fn with(backend: ScriptedBackend, store: MemoryTokenStore, config: ClientConfig) -> Self {
        Self::with_environment(backend, store, config, RecordingEnvironment::default())
    }

    pub fn with_environment(
        backend: ScriptedBackend,
        store: MemoryTokenStore,
        config: ClientConfig,
        environment: RecordingEnvironment,
    ) -> Self {
        let backend = Arc::new(backend);
        let environment = Arc::new(environment);
        let client = HasuraAuthClient::with_parts(
            config,
            backend.clone(),
            Arc::new(store),
            environment.clone(),
        )
        .unwrap();
        Self {
            client: Arc::new(client),
            backend,
            environment,
        }
    }

    pub fn machine(&self) -> &AuthMachine {
        self.client.machine()
    }

    /// Sign in with email and password and return once signed in.
    pub async fn signed_in(&self) {
        let response = self
            .client
            .sign_in(&crate::SignInParams::email_password("user-1@example.com", "secret"))
            .await
            .unwrap();
        assert!(response.error.is_none(), "sign-in failed: {:?}", response.error);
        assert!(self.client.is_authenticated());
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
