//! Core domain types shared by the machine, the backend seam and the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signed-in user profile as reported by the identity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub default_role: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_verified: bool,
}

/// Access/refresh token pair plus the user they belong to.
///
/// Returned by the backend after any successful authentication, and
/// projected back out of machine context by [`AuthContext::session`].
///
/// [`AuthContext::session`]: crate::AuthContext::session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub access_token_expires_in: i64,
    pub refresh_token: String,
    pub user: User,
}

/// Pending multi-factor challenge returned by an email/password sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaChallenge {
    pub ticket: String,
}

/// Outcome of a credential exchange that may stop short of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SignInOutcome {
    /// Credentials accepted, session issued.
    Session(Session),
    /// Credentials accepted but the email address is not verified yet.
    NeedsEmailVerification,
    /// Credentials accepted, a second factor is required.
    MfaRequired(MfaChallenge),
}

/// Optional registration and redirect settings forwarded to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl AuthOptions {
    /// Options carrying only a redirect target.
    pub fn redirect_to(url: impl Into<String>) -> Self {
        Self {
            redirect_to: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Credentials used to upgrade an anonymous user into a regular one.
#[derive(Debug, Clone, PartialEq)]
pub enum DeanonymizeRequest {
    EmailPassword {
        email: String,
        password: String,
        options: AuthOptions,
    },
    PasswordlessEmail {
        email: String,
        options: AuthOptions,
    },
    PasswordlessSms {
        phone_number: String,
        options: AuthOptions,
    },
}
