//! Credential flows run against the session machine.
//!
//! Each flow validates its input, sends one event through the correlator and
//! reads the outcome off the snapshot that settles the authentication region.
//! Backend errors are passed through untouched.

use crate::correlator::{send_and_await, Correlation};
use auth_machine::{
    AuthEvent, AuthEventKind, AuthMachine, AuthOptions, ErrorPayload, MfaChallenge, Session,
    Snapshot,
};

const MIN_PASSWORD_LENGTH: usize = 3;

/// What a settled credential flow produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowResult {
    pub session: Option<Session>,
    pub mfa: Option<MfaChallenge>,
    pub needs_email_verification: bool,
    pub error: Option<ErrorPayload>,
}

impl FlowResult {
    fn failed(error: ErrorPayload) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Read the outcome from the snapshot that settled the flow.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.event == AuthEventKind::AuthenticationFailed {
            let error = snapshot
                .context
                .errors
                .authentication
                .clone()
                .unwrap_or_else(ErrorPayload::unauthenticated);
            return Self::failed(error);
        }

        Self {
            session: if snapshot.matches("authentication.signedIn") {
                snapshot.session()
            } else {
                None
            },
            mfa: if snapshot.matches("authentication.signedOut.needsMfa") {
                snapshot.context.mfa.clone()
            } else {
                None
            },
            needs_email_verification: snapshot
                .matches("authentication.signedOut.needsEmailVerification"),
            error: None,
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(' '),
        None => false,
    }
}

pub(crate) fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

pub(crate) fn is_valid_phone_number(phone_number: &str) -> bool {
    !phone_number.trim().is_empty()
}

/// Error for an event the machine refused, judged from the state it refused it in.
fn rejection(snapshot: &Snapshot) -> ErrorPayload {
    if snapshot.matches("authentication.signedIn") {
        ErrorPayload::already_signed_in()
    } else {
        ErrorPayload::authentication_in_progress()
    }
}

async fn run(machine: &AuthMachine, event: AuthEvent) -> FlowResult {
    match send_and_await(machine, event, |s| !s.is_loading(), None).await {
        Correlation::Settled(snapshot) => FlowResult::from_snapshot(&snapshot),
        Correlation::Rejected(snapshot) => FlowResult::failed(rejection(&snapshot)),
        Correlation::TimedOut | Correlation::Detached => FlowResult::failed(ErrorPayload::detached()),
    }
}

/// Register with email and password. Upgrades an anonymous user instead
/// when one is signed in.
pub async fn sign_up_email_password(
    machine: &AuthMachine,
    email: &str,
    password: &str,
    options: &AuthOptions,
) -> FlowResult {
    if !is_valid_email(email) {
        return FlowResult::failed(ErrorPayload::invalid_email());
    }
    if !is_valid_password(password) {
        return FlowResult::failed(ErrorPayload::invalid_password());
    }
    run(
        machine,
        AuthEvent::SignUpEmailPassword {
            email: email.to_string(),
            password: password.to_string(),
            options: options.clone(),
        },
    )
    .await
}

pub async fn sign_in_email_password(
    machine: &AuthMachine,
    email: &str,
    password: &str,
) -> FlowResult {
    if !is_valid_email(email) {
        return FlowResult::failed(ErrorPayload::invalid_email());
    }
    if !is_valid_password(password) {
        return FlowResult::failed(ErrorPayload::invalid_password());
    }
    run(
        machine,
        AuthEvent::SignInPassword {
            email: email.to_string(),
            password: password.to_string(),
        },
    )
    .await
}

/// Send a magic link.
pub async fn sign_in_passwordless_email(
    machine: &AuthMachine,
    email: &str,
    options: &AuthOptions,
) -> FlowResult {
    if !is_valid_email(email) {
        return FlowResult::failed(ErrorPayload::invalid_email());
    }
    run(
        machine,
        AuthEvent::PasswordlessEmail {
            email: email.to_string(),
            options: options.clone(),
        },
    )
    .await
}

/// Send a one-time code by SMS.
pub async fn sign_in_passwordless_sms(
    machine: &AuthMachine,
    phone_number: &str,
    options: &AuthOptions,
) -> FlowResult {
    if !is_valid_phone_number(phone_number) {
        return FlowResult::failed(ErrorPayload::invalid_phone_number());
    }
    run(
        machine,
        AuthEvent::PasswordlessSms {
            phone_number: phone_number.to_string(),
            options: options.clone(),
        },
    )
    .await
}

pub async fn sign_in_sms_otp(machine: &AuthMachine, phone_number: &str, otp: &str) -> FlowResult {
    if !is_valid_phone_number(phone_number) {
        return FlowResult::failed(ErrorPayload::invalid_phone_number());
    }
    run(
        machine,
        AuthEvent::PasswordlessSmsOtp {
            phone_number: phone_number.to_string(),
            otp: otp.to_string(),
        },
    )
    .await
}

/// Answer a pending MFA challenge. Without an explicit ticket the one from
/// the last challenge is used.
pub async fn sign_in_mfa_totp(machine: &AuthMachine, otp: &str, ticket: Option<&str>) -> FlowResult {
    let has_ticket = ticket.is_some() || machine.snapshot().context.mfa.is_some();
    if !has_ticket {
        return FlowResult::failed(ErrorPayload::no_mfa_ticket());
    }
    run(
        machine,
        AuthEvent::SignInMfaTotp {
            ticket: ticket.map(str::to_string),
            otp: otp.to_string(),
        },
    )
    .await
}

pub async fn sign_in_anonymous(machine: &AuthMachine) -> FlowResult {
    run(machine, AuthEvent::SignInAnonymous).await
}

/// Sign out, optionally from every device.
pub async fn sign_out(machine: &AuthMachine, all: bool) -> FlowResult {
    let settled = |s: &Snapshot| s.matches("authentication.signedOut");
    match send_and_await(machine, AuthEvent::SignOut { all }, settled, None).await {
        Correlation::Settled(snapshot) => FlowResult {
            error: snapshot.context.errors.signout.clone(),
            ..FlowResult::default()
        },
        Correlation::Rejected(_) => FlowResult::failed(ErrorPayload::unauthenticated()),
        Correlation::TimedOut | Correlation::Detached => FlowResult::failed(ErrorPayload::detached()),
    }
}
