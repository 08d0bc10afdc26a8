//! Interpreter for the session machine.
//!
//! [`AuthMachine`] owns both region tables, the context and the current
//! [`Snapshot`]. Every accepted event produces exactly one snapshot, which is
//! delivered to observers in commit order. Network exchanges and the refresh
//! timer run as Tokio tasks and feed their results back as events.

use crate::backend::{AuthBackend, BackendResult};
use crate::error::{ErrorPayload, MachineError, MachineResult};
use crate::event::{AuthEvent, AuthEventKind};
use crate::fsm::{
    authentication_transition, token_transition, AuthFlow, AuthenticationInput,
    AuthenticationPhase, AuthenticationState, SignedOutReason, StateValue, TokenInput,
    TokenPhase, TokenState,
};
use crate::snapshot::{AuthContext, Snapshot};
use crate::storage::{TokenStore, REFRESH_TOKEN_KEY};
use crate::types::{AuthOptions, DeanonymizeRequest, Session, SignInOutcome};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default lead time before access-token expiry at which the timer refreshes.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Default delay before the timer retries a failed refresh of a kept session.
pub const DEFAULT_REFRESH_RETRY: Duration = Duration::from_secs(10);

/// Behaviour switches for the session machine.
#[derive(Debug, Clone)]
pub struct MachineOptions {
    /// Refresh the access token before it expires.
    pub auto_refresh_token: bool,
    /// Restore a persisted refresh token on start.
    pub auto_sign_in: bool,
    /// Fixed refresh period, overriding the expiry-based schedule.
    pub refresh_interval: Option<Duration>,
    pub refresh_margin: Duration,
    /// Delay before retrying after a failed refresh that kept the session.
    pub refresh_retry: Duration,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            auto_sign_in: true,
            refresh_interval: None,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            refresh_retry: DEFAULT_REFRESH_RETRY,
        }
    }
}

impl MachineOptions {
    /// Delay before refreshing an access token that expires in `expires_in` seconds.
    pub fn refresh_delay(&self, expires_in: i64) -> Duration {
        if let Some(interval) = self.refresh_interval {
            return interval;
        }
        let margin = i64::try_from(self.refresh_margin.as_secs()).unwrap_or(i64::MAX);
        let secs = if expires_in > margin {
            expires_in.saturating_sub(margin)
        } else {
            // Short-lived token: refresh at half-life
            (expires_in / 2).max(1)
        };
        Duration::from_secs(secs as u64)
    }
}

/// Result of [`AuthMachine::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// False when the event was not accepted in the current state.
    pub changed: bool,
    /// Sequence of the snapshot current right after the send.
    pub sequence: u64,
}

/// Callback receiving every snapshot committed after it subscribed.
pub type Observer = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

/// Hook run once, when the machine starts.
pub type StartHook = Box<dyn FnOnce(&AuthMachine) + Send>;

/// Handle to a running session machine. Cheap to clone.
#[derive(Clone)]
pub struct AuthMachine {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    options: MachineOptions,
    core: Mutex<Core>,
    observers: Mutex<Observers>,
    lifecycle: Mutex<Lifecycle>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.refresh_timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    runtime: Option<Handle>,
    hooks: Vec<StartHook>,
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    subscribers: BTreeMap<u64, Observer>,
    pending: VecDeque<Arc<Snapshot>>,
    draining: bool,
}

/// Side effect produced by a transition, run after the snapshot is published.
enum Effect {
    Invoke(Request),
    Persist(Option<String>),
    ScheduleRefresh { expires_in: i64 },
    RetryRefresh,
    CancelRefresh,
    Follow(AuthEvent),
}

/// Network exchange started by a transition.
enum Request {
    SignUp {
        email: String,
        password: String,
        options: AuthOptions,
    },
    SignInPassword {
        email: String,
        password: String,
    },
    PasswordlessEmail {
        email: String,
        options: AuthOptions,
    },
    PasswordlessSms {
        phone_number: String,
        options: AuthOptions,
    },
    SmsOtp {
        phone_number: String,
        otp: String,
    },
    MfaTotp {
        ticket: Option<String>,
        otp: String,
    },
    Anonymous,
    Deanonymize {
        access_token: String,
        request: DeanonymizeRequest,
    },
    Refresh {
        token: String,
    },
    SignOut {
        refresh_token: Option<String>,
        all: bool,
    },
}

/// Mutable machine state. Only touched under the core lock.
struct Core {
    authentication: AuthenticationPhase,
    signed_out_reason: SignedOutReason,
    flow: AuthFlow,
    deanonymizing: bool,
    token: TokenPhase,
    /// Token submitted by the refresh currently running.
    refreshing_token: Option<String>,
    context: AuthContext,
    current: Arc<Snapshot>,
}

impl Core {
    fn new() -> Self {
        Self {
            authentication: AuthenticationPhase::Starting,
            signed_out_reason: SignedOutReason::NoErrors,
            flow: AuthFlow::Password,
            deanonymizing: false,
            token: TokenPhase::Idle,
            refreshing_token: None,
            context: AuthContext::default(),
            current: Arc::new(Snapshot::new(
                0,
                StateValue {
                    authentication: AuthenticationState::Starting,
                    token: TokenState::Idle,
                },
                AuthContext::default(),
                AuthEventKind::Init,
            )),
        }
    }

    fn value(&self) -> StateValue {
        let authentication = match self.authentication {
            AuthenticationPhase::Starting => AuthenticationState::Starting,
            AuthenticationPhase::SignedOut => AuthenticationState::SignedOut(self.signed_out_reason),
            AuthenticationPhase::Authenticating => AuthenticationState::Authenticating(self.flow),
            AuthenticationPhase::SignedIn => AuthenticationState::SignedIn,
            AuthenticationPhase::SigningOut => AuthenticationState::SigningOut,
        };
        StateValue {
            authentication,
            token: TokenState::from(&self.token),
        }
    }

    fn commit(&mut self, kind: AuthEventKind) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(
            self.current.sequence + 1,
            self.value(),
            self.context.clone(),
            kind,
        ));
        self.current = snapshot.clone();
        snapshot
    }

    fn step_authentication(&mut self, input: AuthenticationInput) -> Option<()> {
        self.authentication = authentication_transition(&self.authentication, &input)?;
        Some(())
    }

    fn step_token(&mut self, input: TokenInput) -> Option<()> {
        self.token = token_transition(&self.token, &input)?;
        Some(())
    }

    /// Apply `event`. Returns `None`, leaving everything untouched, when the
    /// event is not accepted in the current state.
    fn transition(&mut self, event: &AuthEvent) -> Option<Vec<Effect>> {
        match event {
            AuthEvent::SignUpEmailPassword {
                email,
                password,
                options,
            } => {
                if self.can_deanonymize() {
                    self.deanonymize(
                        AuthFlow::SignUp,
                        DeanonymizeRequest::EmailPassword {
                            email: email.clone(),
                            password: password.clone(),
                            options: options.clone(),
                        },
                    )
                } else {
                    self.authenticate(
                        AuthFlow::SignUp,
                        Request::SignUp {
                            email: email.clone(),
                            password: password.clone(),
                            options: options.clone(),
                        },
                    )
                }
            }
            AuthEvent::SignInPassword { email, password } => self.authenticate(
                AuthFlow::Password,
                Request::SignInPassword {
                    email: email.clone(),
                    password: password.clone(),
                },
            ),
            AuthEvent::PasswordlessEmail { email, options } => {
                if self.can_deanonymize() {
                    self.deanonymize(
                        AuthFlow::PasswordlessEmail,
                        DeanonymizeRequest::PasswordlessEmail {
                            email: email.clone(),
                            options: options.clone(),
                        },
                    )
                } else {
                    self.authenticate(
                        AuthFlow::PasswordlessEmail,
                        Request::PasswordlessEmail {
                            email: email.clone(),
                            options: options.clone(),
                        },
                    )
                }
            }
            AuthEvent::PasswordlessSms {
                phone_number,
                options,
            } => {
                if self.can_deanonymize() {
                    self.deanonymize(
                        AuthFlow::PasswordlessSms,
                        DeanonymizeRequest::PasswordlessSms {
                            phone_number: phone_number.clone(),
                            options: options.clone(),
                        },
                    )
                } else {
                    self.authenticate(
                        AuthFlow::PasswordlessSms,
                        Request::PasswordlessSms {
                            phone_number: phone_number.clone(),
                            options: options.clone(),
                        },
                    )
                }
            }
            AuthEvent::PasswordlessSmsOtp { phone_number, otp } => self.authenticate(
                AuthFlow::PasswordlessSmsOtp,
                Request::SmsOtp {
                    phone_number: phone_number.clone(),
                    otp: otp.clone(),
                },
            ),
            AuthEvent::SignInMfaTotp { ticket, otp } => {
                let ticket = ticket
                    .clone()
                    .or_else(|| self.context.mfa.as_ref().map(|mfa| mfa.ticket.clone()));
                self.authenticate(
                    AuthFlow::MfaTotp,
                    Request::MfaTotp {
                        ticket,
                        otp: otp.clone(),
                    },
                )
            }
            AuthEvent::SignInAnonymous => self.authenticate(AuthFlow::Anonymous, Request::Anonymous),
            AuthEvent::SignOut { all } => {
                self.step_authentication(AuthenticationInput::SignOut)?;
                // Late refresh results must not resurrect the session
                self.reset_token_region();
                Some(vec![
                    Effect::CancelRefresh,
                    Effect::Invoke(Request::SignOut {
                        refresh_token: self.context.refresh_token.value.clone(),
                        all: *all,
                    }),
                ])
            }
            AuthEvent::TryToken { token } => {
                self.step_token(TokenInput::Refresh)?;
                self.refreshing_token = Some(token.clone());
                self.context.errors.token = None;
                Some(vec![Effect::Invoke(Request::Refresh {
                    token: token.clone(),
                })])
            }
            AuthEvent::SessionUnavailable => {
                self.step_authentication(AuthenticationInput::NoSession)?;
                self.signed_out_reason = SignedOutReason::NoErrors;
                Some(Vec::new())
            }
            AuthEvent::SignedIn { session } => {
                self.step_authentication(AuthenticationInput::SessionObtained)?;
                self.context.apply_session(session);
                self.context.errors.authentication = None;
                Some(session_effects(session))
            }
            AuthEvent::TokenChanged { session } => {
                self.step_token(TokenInput::Refreshed)?;
                self.refreshing_token = None;
                self.context.apply_session(session);
                if matches!(
                    self.authentication,
                    AuthenticationPhase::Starting | AuthenticationPhase::SignedOut
                ) {
                    // The follow-up SIGNED_IN persists and schedules
                    Some(vec![Effect::Follow(AuthEvent::SignedIn {
                        session: session.clone(),
                    })])
                } else {
                    Some(session_effects(session))
                }
            }
            AuthEvent::TokenRefreshFailed { error } => {
                self.step_token(TokenInput::Fail)?;
                let failed_token = self.refreshing_token.take();
                self.context.errors.token = Some(error.clone());

                let mut effects = Vec::new();
                match self.authentication {
                    AuthenticationPhase::Starting => {
                        // Drop a rejected stored token, keep it across network failures
                        if !error.is_network() {
                            effects.push(Effect::Persist(None));
                        }
                        effects.push(Effect::Follow(AuthEvent::SessionUnavailable));
                    }
                    AuthenticationPhase::SignedIn
                        if !error.is_network()
                            && failed_token.is_some()
                            && failed_token == self.context.refresh_token.value =>
                    {
                        effects.push(Effect::Follow(AuthEvent::SignedOut { error: None }));
                    }
                    // The session is kept, so the timer has to try again
                    AuthenticationPhase::SignedIn | AuthenticationPhase::Authenticating
                        if self.context.refresh_token.value.is_some() =>
                    {
                        effects.push(Effect::RetryRefresh);
                    }
                    _ => {}
                }
                Some(effects)
            }
            AuthEvent::SignedOut { error } => {
                let input = if self.authentication == AuthenticationPhase::SigningOut {
                    AuthenticationInput::SignOutComplete
                } else {
                    AuthenticationInput::SessionLost
                };
                self.step_authentication(input)?;
                self.signed_out_reason = SignedOutReason::NoErrors;
                self.reset_token_region();
                self.context.clear_session();
                self.context.errors.signout = error.clone();
                Some(vec![Effect::CancelRefresh, Effect::Persist(None)])
            }
            AuthEvent::AwaitingEmailVerification => {
                self.settle(SignedOutReason::NeedsEmailVerification)
            }
            AuthEvent::AwaitingSmsOtp => self.settle(SignedOutReason::NeedsSmsOtp),
            AuthEvent::MfaRequired { challenge } => {
                let effects = self.settle(SignedOutReason::NeedsMfa)?;
                self.context.mfa = Some(challenge.clone());
                Some(effects)
            }
            AuthEvent::Deanonymized => {
                if !self.deanonymizing {
                    return None;
                }
                self.step_authentication(AuthenticationInput::Resume)?;
                self.deanonymizing = false;
                Some(Vec::new())
            }
            AuthEvent::AuthenticationFailed { error } => {
                if self.deanonymizing {
                    self.step_authentication(AuthenticationInput::Resume)?;
                    self.deanonymizing = false;
                } else {
                    self.step_authentication(AuthenticationInput::Settle)?;
                    self.signed_out_reason = SignedOutReason::Failed;
                }
                self.context.errors.authentication = Some(error.clone());
                Some(Vec::new())
            }
        }
    }

    fn authenticate(&mut self, flow: AuthFlow, request: Request) -> Option<Vec<Effect>> {
        self.step_authentication(AuthenticationInput::Authenticate)?;
        self.flow = flow;
        self.context.errors.authentication = None;
        Some(vec![Effect::Invoke(request)])
    }

    fn deanonymize(&mut self, flow: AuthFlow, request: DeanonymizeRequest) -> Option<Vec<Effect>> {
        let access_token = self.context.access_token.value.clone()?;
        self.step_authentication(AuthenticationInput::Deanonymize)?;
        self.flow = flow;
        self.deanonymizing = true;
        self.context.errors.authentication = None;
        Some(vec![Effect::Invoke(Request::Deanonymize {
            access_token,
            request,
        })])
    }

    fn settle(&mut self, reason: SignedOutReason) -> Option<Vec<Effect>> {
        if self.deanonymizing {
            return None;
        }
        self.step_authentication(AuthenticationInput::Settle)?;
        self.signed_out_reason = reason;
        Some(Vec::new())
    }

    fn can_deanonymize(&self) -> bool {
        self.authentication == AuthenticationPhase::SignedIn && self.context.user_is_anonymous()
    }

    fn reset_token_region(&mut self) {
        // Reset is accepted from every token state
        if let Some(phase) = token_transition(&self.token, &TokenInput::Reset) {
            self.token = phase;
        }
        self.refreshing_token = None;
    }
}

fn session_effects(session: &Session) -> Vec<Effect> {
    vec![
        Effect::Persist(Some(session.refresh_token.clone())),
        Effect::ScheduleRefresh {
            expires_in: session.access_token_expires_in,
        },
    ]
}

fn signed_in_or_failed(result: BackendResult<Session>) -> AuthEvent {
    match result {
        Ok(session) => AuthEvent::SignedIn { session },
        Err(error) => AuthEvent::AuthenticationFailed { error },
    }
}

fn outcome_event(result: BackendResult<SignInOutcome>) -> AuthEvent {
    match result {
        Ok(SignInOutcome::Session(session)) => AuthEvent::SignedIn { session },
        Ok(SignInOutcome::NeedsEmailVerification) => AuthEvent::AwaitingEmailVerification,
        Ok(SignInOutcome::MfaRequired(challenge)) => AuthEvent::MfaRequired { challenge },
        Err(error) => AuthEvent::AuthenticationFailed { error },
    }
}

impl AuthMachine {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        options: MachineOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                options,
                core: Mutex::new(Core::new()),
                observers: Mutex::new(Observers::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
                refresh_timer: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &MachineOptions {
        &self.inner.options
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.inner.backend
    }

    /// Start the machine on the current Tokio runtime.
    ///
    /// Runs the queued start hooks, then restores the persisted session when
    /// auto sign-in is on. Calling it again is a no-op.
    pub fn start(&self) -> MachineResult<()> {
        let runtime = Handle::try_current().map_err(|_| MachineError::NoRuntime)?;

        let hooks = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.runtime.is_some() {
                return Ok(());
            }
            lifecycle.runtime = Some(runtime);
            std::mem::take(&mut lifecycle.hooks)
        };

        info!(hooks = hooks.len(), "Starting session machine");
        for hook in hooks {
            hook(self);
        }

        self.bootstrap();
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.inner.lifecycle.lock().runtime.is_some()
    }

    /// Run `hook` when the machine starts, or right away if it already has.
    pub fn on_start(&self, hook: StartHook) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.runtime.is_none() {
                lifecycle.hooks.push(hook);
                return;
            }
        }
        hook(self);
    }

    fn runtime(&self) -> Option<Handle> {
        self.inner.lifecycle.lock().runtime.clone()
    }

    fn bootstrap(&self) {
        let stored = if self.inner.options.auto_sign_in {
            match self.inner.store.get(REFRESH_TOKEN_KEY) {
                Ok(token) => token.filter(|t| !t.is_empty()),
                Err(e) => {
                    warn!(error = %e, "Failed to read stored refresh token");
                    None
                }
            }
        } else {
            None
        };

        match stored {
            Some(token) => {
                info!("Restoring session from stored refresh token");
                self.send(AuthEvent::TryToken { token });
            }
            None => {
                debug!("No stored session");
                self.send(AuthEvent::SessionUnavailable);
            }
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.core.lock().current.clone()
    }

    /// Submit an event.
    ///
    /// Accepted events commit a new snapshot, notify observers and then run
    /// the transition's effects. Rejected events (including anything sent
    /// before [`start`](Self::start)) change nothing.
    pub fn send(&self, event: AuthEvent) -> SendOutcome {
        let kind = event.kind();

        if !self.is_started() {
            warn!(event = %kind, "Event sent before the session machine started, ignoring");
            return SendOutcome {
                changed: false,
                sequence: self.snapshot().sequence,
            };
        }

        let (outcome, effects) = {
            let mut core = self.inner.core.lock();
            let from = core.current.value;
            match core.transition(&event) {
                Some(effects) => {
                    let snapshot = core.commit(kind);
                    debug!(
                        event = %kind,
                        from = %from.authentication.path(),
                        to = %snapshot.value.authentication.path(),
                        token = snapshot.value.token.path(),
                        sequence = snapshot.sequence,
                        "Session machine transition"
                    );
                    let sequence = snapshot.sequence;
                    // Queue while still holding the core lock so delivery follows commit order
                    self.inner.observers.lock().pending.push_back(snapshot);
                    (
                        SendOutcome {
                            changed: true,
                            sequence,
                        },
                        effects,
                    )
                }
                None => {
                    debug!(
                        event = %kind,
                        state = %from.authentication.path(),
                        token = from.token.path(),
                        "Event not accepted in current state"
                    );
                    return SendOutcome {
                        changed: false,
                        sequence: core.current.sequence,
                    };
                }
            }
        };

        self.drain();

        for effect in effects {
            self.run_effect(effect);
        }

        outcome
    }

    /// Deliver queued snapshots. Only one caller drains at a time; sends made
    /// from inside an observer are queued and delivered by that same caller.
    fn drain(&self) {
        {
            let mut observers = self.inner.observers.lock();
            if observers.draining {
                return;
            }
            observers.draining = true;
        }

        loop {
            let (snapshot, subscribers) = {
                let mut observers = self.inner.observers.lock();
                match observers.pending.pop_front() {
                    Some(snapshot) => {
                        let subscribers: Vec<Observer> =
                            observers.subscribers.values().cloned().collect();
                        (snapshot, subscribers)
                    }
                    None => {
                        observers.draining = false;
                        return;
                    }
                }
            };

            for subscriber in subscribers {
                subscriber(&snapshot);
            }
        }
    }

    /// Register an observer for every snapshot committed from now on.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        let mut observers = self.inner.observers.lock();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.subscribers.insert(id, Arc::new(observer));

        Subscription {
            id,
            machine: Arc::downgrade(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().subscribers.len()
    }

    fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::Invoke(request) => self.invoke(request),
            Effect::Persist(token) => self.persist(token.as_deref()),
            Effect::ScheduleRefresh { expires_in } => {
                self.arm_refresh_timer(self.inner.options.refresh_delay(expires_in))
            }
            Effect::RetryRefresh => self.arm_refresh_timer(self.inner.options.refresh_retry),
            Effect::CancelRefresh => self.cancel_refresh(),
            Effect::Follow(event) => {
                self.send(event);
            }
        }
    }

    fn invoke(&self, request: Request) {
        let Some(runtime) = self.runtime() else {
            warn!("Session machine has no runtime, dropping request");
            return;
        };

        let machine = self.clone();
        runtime.spawn(async move {
            let event = machine.execute(request).await;
            machine.send(event);
        });
    }

    async fn execute(&self, request: Request) -> AuthEvent {
        let backend = &self.inner.backend;
        match request {
            Request::SignUp {
                email,
                password,
                options,
            } => outcome_event(
                backend
                    .sign_up_email_password(&email, &password, &options)
                    .await,
            ),
            Request::SignInPassword { email, password } => {
                outcome_event(backend.sign_in_email_password(&email, &password).await)
            }
            Request::PasswordlessEmail { email, options } => {
                match backend.sign_in_passwordless_email(&email, &options).await {
                    Ok(()) => AuthEvent::AwaitingEmailVerification,
                    Err(error) => AuthEvent::AuthenticationFailed { error },
                }
            }
            Request::PasswordlessSms {
                phone_number,
                options,
            } => match backend
                .sign_in_passwordless_sms(&phone_number, &options)
                .await
            {
                Ok(()) => AuthEvent::AwaitingSmsOtp,
                Err(error) => AuthEvent::AuthenticationFailed { error },
            },
            Request::SmsOtp { phone_number, otp } => signed_in_or_failed(
                backend
                    .sign_in_passwordless_sms_otp(&phone_number, &otp)
                    .await,
            ),
            Request::MfaTotp { ticket: None, .. } => AuthEvent::AuthenticationFailed {
                error: ErrorPayload::no_mfa_ticket(),
            },
            Request::MfaTotp {
                ticket: Some(ticket),
                otp,
            } => signed_in_or_failed(backend.sign_in_mfa_totp(&ticket, &otp).await),
            Request::Anonymous => signed_in_or_failed(backend.sign_in_anonymous().await),
            Request::Deanonymize {
                access_token,
                request,
            } => match backend.deanonymize(&access_token, &request).await {
                Ok(()) => AuthEvent::Deanonymized,
                Err(error) => AuthEvent::AuthenticationFailed { error },
            },
            Request::Refresh { token } => match backend.refresh_token(&token).await {
                Ok(session) => AuthEvent::TokenChanged { session },
                Err(error) => {
                    warn!(error = %error, "Token refresh failed");
                    AuthEvent::TokenRefreshFailed { error }
                }
            },
            Request::SignOut { refresh_token, all } => {
                let result = backend.sign_out(refresh_token.as_deref(), all).await;
                if let Err(error) = &result {
                    warn!(error = %error, "Backend sign-out failed, clearing local session anyway");
                }
                AuthEvent::SignedOut {
                    error: result.err(),
                }
            }
        }
    }

    fn persist(&self, token: Option<&str>) {
        let result = match token {
            Some(token) => self.inner.store.set(REFRESH_TOKEN_KEY, token),
            None => self.inner.store.delete(REFRESH_TOKEN_KEY).map(|_| ()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist refresh token");
        }
    }

    fn arm_refresh_timer(&self, delay: Duration) {
        if !self.inner.options.auto_refresh_token {
            return;
        }
        let Some(runtime) = self.runtime() else {
            return;
        };

        debug!(delay_secs = delay.as_secs(), "Scheduling token refresh");

        let machine = Arc::downgrade(&self.inner);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            refresh_tick(machine);
        });

        if let Some(previous) = self.inner.refresh_timer.lock().replace(timer) {
            previous.abort();
        }
    }

    fn cancel_refresh(&self) {
        if let Some(timer) = self.inner.refresh_timer.lock().take() {
            timer.abort();
        }
    }
}

fn refresh_tick(machine: Weak<Inner>) {
    let Some(inner) = machine.upgrade() else {
        return;
    };
    let machine = AuthMachine { inner };

    let Some(token) = machine.snapshot().context.refresh_token.value.clone() else {
        return;
    };
    debug!("Refresh timer fired");
    if !machine.send(AuthEvent::TryToken { token }).changed {
        debug!("Token refresh already running, timer skipped");
    }
}

impl fmt::Debug for AuthMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("AuthMachine")
            .field("started", &self.is_started())
            .field("state", &snapshot.value.authentication.path())
            .field("token", &snapshot.value.token.path())
            .field("sequence", &snapshot.sequence)
            .finish()
    }
}

/// Registration handle returned by [`AuthMachine::subscribe`].
///
/// Dropping it does not detach the observer; call [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    machine: Weak<Inner>,
}

impl Subscription {
    /// Detach the observer. Returns false if it was already detached.
    pub fn unsubscribe(&self) -> bool {
        match self.machine.upgrade() {
            Some(inner) => inner.observers.lock().subscribers.remove(&self.id).is_some(),
            None => false,
        }
    }
}
