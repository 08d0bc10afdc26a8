//! hasura-auth REST client implementing the session machine's backend seam.

use crate::wire::{
    DeanonymizeBody, EmailPasswordRequest, EmailRequest, MfaTotpRequest, NewEmailRequest,
    NewPasswordRequest, RefreshTokenRequest, SessionEnvelope, SignOutRequest, SmsOtpRequest,
    SmsRequest,
};
use crate::{HttpError, HttpResult};
use async_trait::async_trait;
use auth_machine::error::OTHER_ERROR_STATUS;
use auth_machine::{
    AuthBackend, AuthOptions, BackendResult, DeanonymizeRequest, ErrorPayload, Session,
    SignInOutcome,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Default bound on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Decode a non-2xx response body. hasura-auth answers with
/// `{ status, error, message }`; anything else keeps the HTTP status.
pub(crate) fn error_from_body(status: u16, body: &str) -> ErrorPayload {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload,
        Err(_) => ErrorPayload::new(
            status,
            "unknown-error",
            if body.is_empty() {
                format!("Request failed with status {}", status)
            } else {
                body.chars().take(200).collect()
            },
        ),
    }
}

fn transport_error(err: reqwest::Error) -> ErrorPayload {
    ErrorPayload::network(err.to_string())
}

/// HTTP transport for the hasura-auth endpoints.
#[derive(Clone)]
pub struct HttpAuthBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAuthBackend {
    /// Create a backend for the service at `base_url`
    /// (e.g. `https://xyz.auth.eu-central-1.nhost.run/v1`).
    pub fn new(base_url: &str) -> HttpResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(HttpError::Client)?;
        Self::with_client(http_client, base_url)
    }

    /// Use a preconfigured `reqwest` client.
    pub fn with_client(http_client: reqwest::Client, base_url: &str) -> HttpResult<Self> {
        let parsed = Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HttpError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        access_token: Option<&str>,
    ) -> BackendResult<reqwest::Response> {
        let url = self.endpoint(path);
        tracing::debug!(endpoint = %path, "Calling identity endpoint");

        let mut request = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            tracing::warn!(endpoint = %path, error = %err, "Identity endpoint unreachable");
            transport_error(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_body(status.as_u16(), &body);
            tracing::debug!(
                endpoint = %path,
                status = %status,
                error = %error.error,
                "Identity endpoint rejected request"
            );
            return Err(error);
        }
        Ok(response)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        access_token: Option<&str>,
    ) -> BackendResult<T> {
        let response = self.send(path, body, access_token).await?;
        response.json::<T>().await.map_err(|err| {
            tracing::warn!(endpoint = %path, error = %err, "Malformed identity response");
            ErrorPayload::new(
                OTHER_ERROR_STATUS,
                "invalid-response",
                format!("Malformed response from {}: {}", path, err),
            )
        })
    }

    /// POST for endpoints that answer `OK` with no useful body.
    async fn post_empty<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        access_token: Option<&str>,
    ) -> BackendResult<()> {
        self.send(path, body, access_token).await.map(|_| ())
    }

    async fn post_session<B: Serialize>(&self, path: &str, body: &B) -> BackendResult<Session> {
        let envelope: SessionEnvelope = self.post_json(path, body, None).await?;
        match envelope.into_outcome() {
            SignInOutcome::Session(session) => Ok(session),
            _ => Err(ErrorPayload::new(
                OTHER_ERROR_STATUS,
                "invalid-response",
                format!("No session returned from {}", path),
            )),
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn sign_up_email_password(
        &self,
        email: &str,
        password: &str,
        options: &AuthOptions,
    ) -> BackendResult<SignInOutcome> {
        let body = EmailPasswordRequest {
            email,
            password,
            options: Some(options),
        };
        let envelope: SessionEnvelope = self
            .post_json("/signup/email-password", &body, None)
            .await?;
        Ok(envelope.into_outcome())
    }

    async fn sign_in_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<SignInOutcome> {
        let body = EmailPasswordRequest {
            email,
            password,
            options: None,
        };
        let envelope: SessionEnvelope = self
            .post_json("/signin/email-password", &body, None)
            .await?;
        Ok(envelope.into_outcome())
    }

    async fn sign_in_passwordless_email(
        &self,
        email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()> {
        self.post_empty(
            "/signin/passwordless/email",
            &EmailRequest { email, options },
            None,
        )
        .await
    }

    async fn sign_in_passwordless_sms(
        &self,
        phone_number: &str,
        options: &AuthOptions,
    ) -> BackendResult<()> {
        self.post_empty(
            "/signin/passwordless/sms",
            &SmsRequest {
                phone_number,
                options,
            },
            None,
        )
        .await
    }

    async fn sign_in_passwordless_sms_otp(
        &self,
        phone_number: &str,
        otp: &str,
    ) -> BackendResult<Session> {
        self.post_session(
            "/signin/passwordless/sms/otp",
            &SmsOtpRequest { phone_number, otp },
        )
        .await
    }

    async fn sign_in_mfa_totp(&self, ticket: &str, otp: &str) -> BackendResult<Session> {
        self.post_session("/signin/mfa/totp", &MfaTotpRequest { ticket, otp })
            .await
    }

    async fn sign_in_anonymous(&self) -> BackendResult<Session> {
        self.post_session("/signin/anonymous", &serde_json::json!({}))
            .await
    }

    async fn deanonymize(
        &self,
        access_token: &str,
        request: &DeanonymizeRequest,
    ) -> BackendResult<()> {
        self.post_empty(
            "/user/deanonymize",
            &DeanonymizeBody::from(request),
            Some(access_token),
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> BackendResult<Session> {
        self.post_json("/token", &RefreshTokenRequest { refresh_token }, None)
            .await
    }

    async fn sign_out(&self, refresh_token: Option<&str>, all: bool) -> BackendResult<()> {
        self.post_empty("/signout", &SignOutRequest { refresh_token, all }, None)
            .await
    }

    async fn reset_password(&self, email: &str, options: &AuthOptions) -> BackendResult<()> {
        self.post_empty(
            "/user/password/reset",
            &EmailRequest { email, options },
            None,
        )
        .await
    }

    async fn change_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> BackendResult<()> {
        self.post_empty(
            "/user/password",
            &NewPasswordRequest { new_password },
            Some(access_token),
        )
        .await
    }

    async fn send_verification_email(
        &self,
        email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()> {
        self.post_empty(
            "/user/email/send-verification-email",
            &EmailRequest { email, options },
            None,
        )
        .await
    }

    async fn change_email(
        &self,
        access_token: &str,
        new_email: &str,
        options: &AuthOptions,
    ) -> BackendResult<()> {
        self.post_empty(
            "/user/email/change",
            &NewEmailRequest { new_email, options },
            Some(access_token),
        )
        .await
    }
}
