//! Scripted backend double for exercising the machine without a network.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream crates.

use crate::backend::{AuthBackend, BackendResult};
use crate::types::{AuthOptions, DeanonymizeRequest, Session, SignInOutcome, User};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;

/// A call observed by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    SignUp { email: String },
    SignInPassword { email: String },
    PasswordlessEmail { email: String },
    PasswordlessSms { phone_number: String },
    SmsOtp { phone_number: String, otp: String },
    MfaTotp { ticket: String, otp: String },
    Anonymous,
    Deanonymize { access_token: String },
    Refresh { token: String },
    SignOut { all: bool },
    ResetPassword { email: String },
    ChangePassword { access_token: String },
    SendVerificationEmail { email: String },
    ChangeEmail { new_email: String },
}

/// Responses handed out by [`ScriptedBackend`], one slot per endpoint family.
#[derive(Debug, Clone)]
pub struct Script {
    pub sign_up: BackendResult<SignInOutcome>,
    pub sign_in: BackendResult<SignInOutcome>,
    pub passwordless: BackendResult<()>,
    /// SMS one-time code, TOTP and anonymous sign-in.
    pub session: BackendResult<Session>,
    /// `None` hands out a fresh session for the scripted user on every refresh.
    pub refresh: Option<BackendResult<Session>>,
    pub deanonymize: BackendResult<()>,
    /// Sign-out, password and email actions.
    pub action: BackendResult<()>,
}

impl Default for Script {
    fn default() -> Self {
        let session = test_session("user-1");
        Self {
            sign_up: Ok(SignInOutcome::Session(session.clone())),
            sign_in: Ok(SignInOutcome::Session(session.clone())),
            passwordless: Ok(()),
            session: Ok(session),
            refresh: None,
            deanonymize: Ok(()),
            action: Ok(()),
        }
    }
}

/// Backend double that answers from a [`Script`] and records every call.
pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<BackendCall>>,
    refresh_gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    refreshes: AtomicU64,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::with_script(Script::default())
    }

    pub fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
            refresh_gate: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Replace part of the script.
    pub fn update(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock());
    }

    /// Make every refresh call wait until [`release_refresh`] is called.
    ///
    /// [`release_refresh`]: ScriptedBackend::release_refresh
    pub fn hold_refreshes(&self) {
        *self.refresh_gate.lock() = Some(std::sync::Arc::new(Semaphore::new(0)));
    }

    /// Let one held refresh call complete.
    pub fn release_refresh(&self) {
        if let Some(gate) = self.refresh_gate.lock().as_ref() {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Refresh { .. }))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn sign_up_email_password(
        &self,
        email: &str,
        _password: &str,
        _options: &AuthOptions,
    ) -> BackendResult<SignInOutcome> {
        self.record(BackendCall::SignUp {
            email: email.to_string(),
        });
        self.script.lock().sign_up.clone()
    }

    async fn sign_in_email_password(
        &self,
        email: &str,
        _password: &str,
    ) -> BackendResult<SignInOutcome> {
        self.record(BackendCall::SignInPassword {
            email: email.to_string(),
        });
        self.script.lock().sign_in.clone()
    }

    async fn sign_in_passwordless_email(
        &self,
        email: &str,
        _options: &AuthOptions,
    ) -> BackendResult<()> {
        self.record(BackendCall::PasswordlessEmail {
            email: email.to_string(),
        });
        self.script.lock().passwordless.clone()
    }

    async fn sign_in_passwordless_sms(
        &self,
        phone_number: &str,
        _options: &AuthOptions,
    ) -> BackendResult<()> {
        self.record(BackendCall::PasswordlessSms {
            phone_number: phone_number.to_string(),
        });
        self.script.lock().passwordless.clone()
    }

    async fn sign_in_passwordless_sms_otp(
        &self,
        phone_number: &str,
        otp: &str,
    ) -> BackendResult<Session> {
        self.record(BackendCall::SmsOtp {
            phone_number: phone_number.to_string(),
            otp: otp.to_string(),
        });
        self.script.lock().session.clone()
    }

    async fn sign_in_mfa_totp(&self, ticket: &str, otp: &str) -> BackendResult<Session> {
        self.record(BackendCall::MfaTotp {
            ticket: ticket.to_string(),
            otp: otp.to_string(),
        });
        self.script.lock().session.clone()
    }

    async fn sign_in_anonymous(&self) -> BackendResult<Session> {
        self.record(BackendCall::Anonymous);
        self.script.lock().session.clone()
    }

    async fn deanonymize(
        &self,
        access_token: &str,
        _request: &DeanonymizeRequest,
    ) -> BackendResult<()> {
        self.record(BackendCall::Deanonymize {
            access_token: access_token.to_string(),
        });
        self.script.lock().deanonymize.clone()
    }

    async fn refresh_token(&self, refresh_token: &str) -> BackendResult<Session> {
        self.record(BackendCall::Refresh {
            token: refresh_token.to_string(),
        });

        let gate = self.refresh_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let scripted = self.script.lock().refresh.clone();
        match scripted {
            Some(result) => result,
            None => {
                let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                let mut session = test_session("user-1");
                session.access_token = test_access_token("user-1", n);
                session.refresh_token = format!("refresh-{}", n);
                Ok(session)
            }
        }
    }

    async fn sign_out(&self, _refresh_token: Option<&str>, all: bool) -> BackendResult<()> {
        self.record(BackendCall::SignOut { all });
        self.script.lock().action.clone()
    }

    async fn reset_password(&self, email: &str, _options: &AuthOptions) -> BackendResult<()> {
        self.record(BackendCall::ResetPassword {
            email: email.to_string(),
        });
        self.script.lock().action.clone()
    }

    async fn change_password(
        &self,
        access_token: &str,
        _new_password: &str,
    ) -> BackendResult<()> {
        self.record(BackendCall::ChangePassword {
            access_token: access_token.to_string(),
        });
        self.script.lock().action.clone()
    }

    async fn send_verification_email(
        &self,
        email: &str,
        _options: &AuthOptions,
    ) -> BackendResult<()> {
        self.record(BackendCall::SendVerificationEmail {
            email: email.to_string(),
        });
        self.script.lock().action.clone()
    }

    async fn change_email(
        &self,
        _access_token: &str,
        new_email: &str,
        _options: &AuthOptions,
    ) -> BackendResult<()> {
        self.record(BackendCall::ChangeEmail {
            new_email: new_email.to_string(),
        });
        self.script.lock().action.clone()
    }
}

/// Minimal user with the given id.
pub fn test_user(id: &str) -> User {
    User {
        id: id.to_string(),
        created_at: None,
        display_name: format!("{} display", id),
        avatar_url: String::new(),
        locale: "en".to_string(),
        email: Some(format!("{}@example.com", id)),
        is_anonymous: false,
        default_role: "user".to_string(),
        roles: vec!["user".to_string(), "me".to_string()],
        metadata: serde_json::Value::Null,
        email_verified: true,
        phone_number: None,
        phone_number_verified: false,
    }
}

/// Unsigned JWT carrying Hasura claims for `user_id`; `nonce` keeps tokens distinct.
pub fn test_access_token(user_id: &str, nonce: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "sub": user_id,
        "iat": 1_700_000_000u64 + nonce,
        "exp": 1_700_000_900u64 + nonce,
        "https://hasura.io/jwt/claims": {
            "x-hasura-user-id": user_id,
            "x-hasura-default-role": "user",
            "x-hasura-allowed-roles": ["user", "me"],
            "x-hasura-company-id": "acme"
        }
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

/// Session for `user_id` with a decodable access token.
pub fn test_session(user_id: &str) -> Session {
    Session {
        access_token: test_access_token(user_id, 0),
        access_token_expires_in: 900,
        refresh_token: format!("refresh-{}", user_id),
        user: test_user(user_id),
    }
}

/// Same as [`test_session`] but for an anonymous user.
pub fn anonymous_session(user_id: &str) -> Session {
    let mut session = test_session(user_id);
    session.user.is_anonymous = true;
    session.user.email = None;
    session.user.roles = vec!["anonymous".to_string()];
    session
}
