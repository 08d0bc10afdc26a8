//! Transport seam towards the identity endpoints.

use crate::error::ErrorPayload;
use crate::types::{AuthOptions, DeanonymizeRequest, Session, SignInOutcome};
use async_trait::async_trait;

/// Result of a backend call. Errors are data, passed through untouched.
pub type BackendResult<T> = Result<T, ErrorPayload>;

/// One method per identity endpoint the session machine and the action
/// library talk to.
///
/// Implementations must map transport failures to
/// [`ErrorPayload::network`] so callers can tell them from rejections.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up_email_password(
        &self,
        email: &str,
        password: &str,
        options: &AuthOptions,
    ) -> BackendResult<SignInOutcome>;

    async fn sign_in_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<SignInOutcome>;

    async fn sign_in_passwordless_email(
        &self,
        email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()>;

    async fn sign_in_passwordless_sms(
        &self,
        phone_number: &str,
        options: &AuthOptions,
    ) -> BackendResult<()>;

    async fn sign_in_passwordless_sms_otp(
        &self,
        phone_number: &str,
        otp: &str,
    ) -> BackendResult<Session>;

    async fn sign_in_mfa_totp(&self, ticket: &str, otp: &str) -> BackendResult<Session>;

    async fn sign_in_anonymous(&self) -> BackendResult<Session>;

    async fn deanonymize(
        &self,
        access_token: &str,
        request: &DeanonymizeRequest,
    ) -> BackendResult<()>;

    async fn refresh_token(&self, refresh_token: &str) -> BackendResult<Session>;

    async fn sign_out(&self, refresh_token: Option<&str>, all: bool) -> BackendResult<()>;

    async fn reset_password(&self, email: &str, options: &AuthOptions) -> BackendResult<()>;

    async fn change_password(&self, access_token: &str, new_password: &str)
        -> BackendResult<()>;

    async fn send_verification_email(
        &self,
        email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()>;

    async fn change_email(
        &self,
        access_token: &str,
        new_email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()>;
}
