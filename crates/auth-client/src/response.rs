//! Results returned by the client's public operations.
//!
//! Failures the caller is expected to handle travel in the `error` field.

use auth_machine::{ErrorPayload, MfaChallenge, Session};
use serde::Serialize;

/// Result of `sign_up`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignUpResponse {
    pub session: Option<Session>,
    pub error: Option<ErrorPayload>,
}

impl SignUpResponse {
    pub fn failed(error: ErrorPayload) -> Self {
        Self {
            session: None,
            error: Some(error),
        }
    }
}

/// Redirect produced by an external-provider sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRedirect {
    pub provider: String,
    pub provider_url: String,
}

/// Result of `sign_in`.
///
/// When `error` is absent, at most one of `session` and `mfa` is set; both
/// are absent for flows that continue out of band (magic link, SMS code,
/// provider redirect).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignInResponse {
    pub session: Option<Session>,
    pub mfa: Option<MfaChallenge>,
    pub error: Option<ErrorPayload>,
    #[serde(flatten)]
    pub redirect: Option<ProviderRedirect>,
}

impl SignInResponse {
    pub fn failed(error: ErrorPayload) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_session(session: Option<Session>, error: Option<ErrorPayload>) -> Self {
        Self {
            session,
            error,
            ..Self::default()
        }
    }
}

/// Result of operations that only report success or failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionResponse {
    pub error: Option<ErrorPayload>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(error: ErrorPayload) -> Self {
        Self { error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of `refresh_session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshResponse {
    pub session: Option<Session>,
    pub error: Option<ErrorPayload>,
}

impl RefreshResponse {
    pub fn failed(error: ErrorPayload) -> Self {
        Self {
            session: None,
            error: Some(error),
        }
    }
}

/// Snapshot of whether the user is signed in and whether that is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationStatus {
    pub is_authenticated: bool,
    /// True while the client cannot tell yet.
    pub is_loading: bool,
}
