//! Password and email actions, and sign-out.

use super::{config, Harness};
use crate::ClientConfig;
use auth_machine::testing::{BackendCall, ScriptedBackend};
use auth_machine::{AuthOptions, ErrorPayload, MemoryTokenStore};

#[tokio::test]
async fn reset_password_does_not_wait_for_start() {
    let harness = Harness::with(
        ScriptedBackend::new(),
        MemoryTokenStore::new(),
        ClientConfig {
            start: false,
            ..config()
        },
    );

    let response = harness
        .client
        .reset_password("joe@example.com", &AuthOptions::redirect_to("/reset"))
        .await;

    assert!(response.is_ok());
    assert_eq!(
        harness.backend.calls(),
        vec![BackendCall::ResetPassword {
            email: "joe@example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn change_password_needs_a_session() {
    let harness = Harness::new();
    harness.client.wait_until_ready().await.unwrap();

    let response = harness.client.change_password("new-secret").await;

    assert_eq!(response.error, Some(ErrorPayload::unauthenticated()));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn change_password_uses_current_access_token() {
    let harness = Harness::new();
    harness.signed_in().await;
    let token = harness.client.get_access_token().unwrap();

    let response = harness.client.change_password("new-secret").await;

    assert!(response.is_ok());
    assert!(harness
        .backend
        .calls()
        .contains(&BackendCall::ChangePassword { access_token: token }));
}

#[tokio::test]
async fn short_password_is_rejected_locally() {
    let harness = Harness::new();
    harness.signed_in().await;

    let response = harness.client.change_password("ab").await;

    assert_eq!(response.error, Some(ErrorPayload::invalid_password()));
    assert_eq!(harness.backend.calls().len(), 1);
}

#[tokio::test]
async fn change_email_failure_passes_through() {
    let harness = Harness::new();
    harness.signed_in().await;
    let conflict = ErrorPayload::new(409, "email-already-in-use", "Email already in use");
    let scripted = conflict.clone();
    harness.backend.update(move |script| script.action = Err(scripted));

    let response = harness
        .client
        .change_email("joe@example.com", &AuthOptions::default())
        .await;

    assert_eq!(response.error, Some(conflict));
    // The session is untouched
    assert!(harness.client.is_authenticated());
}

#[tokio::test]
async fn verification_email_validates_address() {
    let harness = Harness::new();

    let response = harness
        .client
        .send_verification_email("joe", &AuthOptions::default())
        .await;
    assert_eq!(response.error, Some(ErrorPayload::invalid_email()));

    let response = harness
        .client
        .send_verification_email("joe@example.com", &AuthOptions::default())
        .await;
    assert!(response.is_ok());
    assert_eq!(
        harness.backend.calls(),
        vec![BackendCall::SendVerificationEmail {
            email: "joe@example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn sign_out_everywhere() {
    let harness = Harness::new();
    harness.signed_in().await;

    let response = harness.client.sign_out(true).await.unwrap();

    assert!(response.is_ok());
    assert!(!harness.client.is_authenticated());
    assert!(harness
        .backend
        .calls()
        .contains(&BackendCall::SignOut { all: true }));
}

#[tokio::test]
async fn sign_out_when_signed_out() {
    let harness = Harness::new();
    harness.client.wait_until_ready().await.unwrap();

    let response = harness.client.sign_out(false).await.unwrap();

    assert_eq!(response.error, Some(ErrorPayload::unauthenticated()));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn failed_backend_sign_out_still_clears_session() {
    let harness = Harness::new();
    harness.signed_in().await;
    let unreachable = ErrorPayload::network("connection refused");
    let scripted = unreachable.clone();
    harness.backend.update(move |script| script.action = Err(scripted));

    let response = harness.client.sign_out(false).await.unwrap();

    assert_eq!(response.error, Some(unreachable));
    assert!(!harness.client.is_authenticated());
    assert!(harness.client.get_session().is_none());
}

#[tokio::test]
async fn concurrent_resets_run_independently() {
    let harness = Harness::new();
    let options = AuthOptions::default();

    let (first, second) = tokio::join!(
        harness.client.reset_password("joe@example.com", &options),
        harness.client.reset_password("ann@example.com", &options),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(harness.backend.calls().len(), 2);
}
