//! Credential flow tests for the session machine.

use super::{record, wait_until, Harness};
use crate::testing::{anonymous_session, test_session, BackendCall, ScriptedBackend};
use crate::{
    AuthEvent, AuthEventKind, AuthOptions, ErrorPayload, MachineOptions, MemoryTokenStore,
    MfaChallenge, SignInOutcome, TokenStore, REFRESH_TOKEN_KEY,
};

fn password_event() -> AuthEvent {
    AuthEvent::SignInPassword {
        email: "user-1@example.com".to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn password_sign_in_produces_session() {
    let harness = Harness::new();
    harness.start().await;

    assert!(harness.machine.send(password_event()).changed);
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedIn"));
    assert_eq!(snapshot.event, AuthEventKind::SignedIn);
    let session = snapshot.session().unwrap();
    assert_eq!(session.user.id, "user-1");
    assert_eq!(
        harness.store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
        Some("refresh-user-1")
    );
}

#[tokio::test]
async fn authenticating_state_names_the_flow() {
    let harness = Harness::new();
    harness.start().await;
    let seen = record(&harness.machine);

    harness.machine.send(password_event());
    wait_until(&harness.machine, |s| !s.is_loading()).await;

    let seen = seen.lock();
    assert!(seen[0].matches("authentication.authenticating.password"));
    assert!(seen[0].is_loading());
}

#[tokio::test]
async fn unverified_email_settles_signed_out() {
    let backend = ScriptedBackend::new();
    backend.update(|script| script.sign_in = Ok(SignInOutcome::NeedsEmailVerification));
    let harness = Harness::with(backend, MemoryTokenStore::new(), MachineOptions::default());
    harness.start().await;

    harness.machine.send(password_event());
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedOut.needsEmailVerification"));
    assert!(snapshot.session().is_none());
}

#[tokio::test]
async fn mfa_challenge_then_totp() {
    let backend = ScriptedBackend::new();
    backend.update(|script| {
        script.sign_in = Ok(SignInOutcome::MfaRequired(MfaChallenge {
            ticket: "mfaTotp:abc".to_string(),
        }))
    });
    let harness = Harness::with(backend, MemoryTokenStore::new(), MachineOptions::default());
    harness.start().await;

    harness.machine.send(password_event());
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedOut.needsMfa"));
    assert_eq!(
        snapshot.context.mfa.as_ref().map(|m| m.ticket.as_str()),
        Some("mfaTotp:abc")
    );

    // Ticket omitted: taken from the pending challenge
    harness.machine.send(AuthEvent::SignInMfaTotp {
        ticket: None,
        otp: "123456".to_string(),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedIn"));
    assert!(snapshot.context.mfa.is_none());
    assert!(harness.backend.calls().contains(&BackendCall::MfaTotp {
        ticket: "mfaTotp:abc".to_string(),
        otp: "123456".to_string(),
    }));
}

#[tokio::test]
async fn totp_without_any_ticket_fails() {
    let harness = Harness::new();
    harness.start().await;

    harness.machine.send(AuthEvent::SignInMfaTotp {
        ticket: None,
        otp: "123456".to_string(),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedOut.failed"));
    assert_eq!(
        snapshot.context.errors.authentication,
        Some(ErrorPayload::no_mfa_ticket())
    );
}

#[tokio::test]
async fn rejected_credentials_record_error() {
    let backend = ScriptedBackend::new();
    backend.update(|script| {
        script.sign_in = Err(ErrorPayload::new(
            401,
            "invalid-email-password",
            "Incorrect email or password",
        ))
    });
    let harness = Harness::with(backend, MemoryTokenStore::new(), MachineOptions::default());
    harness.start().await;

    harness.machine.send(password_event());
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedOut.failed"));
    assert_eq!(
        snapshot
            .context
            .errors
            .authentication
            .as_ref()
            .map(|e| e.error.as_str()),
        Some("invalid-email-password")
    );

    // A new attempt clears the previous error
    harness.backend.update(|script| {
        script.sign_in = Ok(SignInOutcome::Session(test_session("user-1")))
    });
    harness.machine.send(password_event());
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.context.errors.authentication.is_none());
}

#[tokio::test]
async fn passwordless_sms_then_otp() {
    let harness = Harness::new();
    harness.start().await;

    harness.machine.send(AuthEvent::PasswordlessSms {
        phone_number: "+15550100".to_string(),
        options: AuthOptions::default(),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedOut.needsSmsOtp"));

    harness.machine.send(AuthEvent::PasswordlessSmsOtp {
        phone_number: "+15550100".to_string(),
        otp: "000000".to_string(),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedIn"));
}

#[tokio::test]
async fn passwordless_email_awaits_verification() {
    let harness = Harness::new();
    harness.start().await;

    harness.machine.send(AuthEvent::PasswordlessEmail {
        email: "joe@example.com".to_string(),
        options: AuthOptions::redirect_to("/home"),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedOut.needsEmailVerification"));
}

#[tokio::test]
async fn sign_in_while_signed_in_is_rejected() {
    let harness = Harness::new();
    harness.start().await;
    harness.machine.send(password_event());
    let signed_in = wait_until(&harness.machine, |s| !s.is_loading()).await;

    let outcome = harness.machine.send(password_event());
    assert!(!outcome.changed);
    assert_eq!(outcome.sequence, signed_in.sequence);
    assert_eq!(harness.machine.snapshot().sequence, signed_in.sequence);
}

#[tokio::test]
async fn sign_out_clears_session() {
    let harness = Harness::new();
    harness.start().await;
    harness.machine.send(password_event());
    wait_until(&harness.machine, |s| s.matches("authentication.signedIn")).await;

    let outcome = harness.machine.send(AuthEvent::SignOut { all: true });
    assert!(outcome.changed);
    assert!(harness.machine.snapshot().matches("authentication.signingOut"));

    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedOut.noErrors"));
    assert_eq!(snapshot.event, AuthEventKind::SignedOut);
    assert!(snapshot.session().is_none());
    assert!(harness.store.get(REFRESH_TOKEN_KEY).unwrap().is_none());
    assert!(harness
        .backend
        .calls()
        .contains(&BackendCall::SignOut { all: true }));
}

#[tokio::test]
async fn backend_sign_out_failure_still_signs_out() {
    let harness = Harness::new();
    harness.start().await;
    harness.machine.send(password_event());
    wait_until(&harness.machine, |s| s.matches("authentication.signedIn")).await;

    harness
        .backend
        .update(|script| script.action = Err(ErrorPayload::network("offline")));
    harness.machine.send(AuthEvent::SignOut { all: false });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedOut"));
    assert!(snapshot.context.errors.signout.is_some());
    assert!(snapshot.session().is_none());
}

#[tokio::test]
async fn sign_out_when_signed_out_is_rejected() {
    let harness = Harness::new();
    harness.start().await;

    assert!(!harness.machine.send(AuthEvent::SignOut { all: false }).changed);
}

#[tokio::test]
async fn anonymous_user_is_deanonymized_by_sign_up() {
    let backend = ScriptedBackend::new();
    backend.update(|script| script.session = Ok(anonymous_session("anon-1")));
    let harness = Harness::with(backend, MemoryTokenStore::new(), MachineOptions::default());
    harness.start().await;

    harness.machine.send(AuthEvent::SignInAnonymous);
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.user().unwrap().is_anonymous);
    let access_token = snapshot.context.access_token.value.clone().unwrap();

    let outcome = harness.machine.send(AuthEvent::SignUpEmailPassword {
        email: "joe@example.com".to_string(),
        password: "secret".to_string(),
        options: AuthOptions::default(),
    });
    assert!(outcome.changed);
    assert!(harness
        .machine
        .snapshot()
        .matches("authentication.authenticating.signUp"));

    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;
    assert!(snapshot.matches("authentication.signedIn"));
    assert_eq!(snapshot.event, AuthEventKind::Deanonymized);
    assert!(harness
        .backend
        .calls()
        .contains(&BackendCall::Deanonymize { access_token }));
    assert!(!harness
        .backend
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::SignUp { .. })));
}

#[tokio::test]
async fn failed_deanonymization_keeps_anonymous_session() {
    let backend = ScriptedBackend::new();
    backend.update(|script| {
        script.session = Ok(anonymous_session("anon-1"));
        script.deanonymize = Err(ErrorPayload::new(409, "email-already-in-use", "Email already in use"));
    });
    let harness = Harness::with(backend, MemoryTokenStore::new(), MachineOptions::default());
    harness.start().await;
    harness.machine.send(AuthEvent::SignInAnonymous);
    wait_until(&harness.machine, |s| !s.is_loading()).await;

    harness.machine.send(AuthEvent::PasswordlessEmail {
        email: "joe@example.com".to_string(),
        options: AuthOptions::default(),
    });
    let snapshot = wait_until(&harness.machine, |s| !s.is_loading()).await;

    assert!(snapshot.matches("authentication.signedIn"));
    assert!(snapshot.session().is_some());
    assert_eq!(
        snapshot.context.errors.authentication.as_ref().map(|e| e.status),
        Some(409)
    );
}

#[tokio::test]
async fn regular_user_cannot_deanonymize() {
    let harness = Harness::new();
    harness.start().await;
    harness.machine.send(password_event());
    wait_until(&harness.machine, |s| s.matches("authentication.signedIn")).await;

    let outcome = harness.machine.send(AuthEvent::PasswordlessSms {
        phone_number: "+15550100".to_string(),
        options: AuthOptions::default(),
    });
    assert!(!outcome.changed);
}
