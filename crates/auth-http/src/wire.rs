//! Request and response bodies of the hasura-auth REST API.

use auth_machine::{AuthOptions, DeanonymizeRequest, MfaChallenge, Session, SignInOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmailPasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'a AuthOptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmailRequest<'a> {
    pub email: &'a str,
    pub options: &'a AuthOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SmsRequest<'a> {
    pub phone_number: &'a str,
    pub options: &'a AuthOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SmsOtpRequest<'a> {
    pub phone_number: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MfaTotpRequest<'a> {
    pub ticket: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignOutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<&'a str>,
    pub all: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewPasswordRequest<'a> {
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewEmailRequest<'a> {
    pub new_email: &'a str,
    pub options: &'a AuthOptions,
}

/// Body of `/user/deanonymize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeanonymizeBody<'a> {
    pub sign_in_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<&'a str>,
    pub options: &'a AuthOptions,
}

impl<'a> From<&'a DeanonymizeRequest> for DeanonymizeBody<'a> {
    fn from(request: &'a DeanonymizeRequest) -> Self {
        match request {
            DeanonymizeRequest::EmailPassword {
                email,
                password,
                options,
            } => Self {
                sign_in_method: "email-password",
                connection: None,
                email: Some(email.as_str()),
                password: Some(password.as_str()),
                phone_number: None,
                options,
            },
            DeanonymizeRequest::PasswordlessEmail { email, options } => Self {
                sign_in_method: "passwordless",
                connection: Some("email"),
                email: Some(email.as_str()),
                password: None,
                phone_number: None,
                options,
            },
            DeanonymizeRequest::PasswordlessSms {
                phone_number,
                options,
            } => Self {
                sign_in_method: "passwordless",
                connection: Some("sms"),
                email: None,
                password: None,
                phone_number: Some(phone_number.as_str()),
                options,
            },
        }
    }
}

/// `{ session, mfa }` envelope returned by the sign-in and sign-up endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionEnvelope {
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub mfa: Option<MfaChallenge>,
}

impl SessionEnvelope {
    /// No session and no challenge means the email address awaits verification.
    pub fn into_outcome(self) -> SignInOutcome {
        match (self.session, self.mfa) {
            (Some(session), _) => SignInOutcome::Session(session),
            (None, Some(mfa)) => SignInOutcome::MfaRequired(mfa),
            (None, None) => SignInOutcome::NeedsEmailVerification,
        }
    }
}
