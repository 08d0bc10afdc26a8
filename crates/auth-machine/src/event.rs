//! Events accepted by the session machine.

use crate::error::ErrorPayload;
use crate::types::{AuthOptions, MfaChallenge, Session};
use serde::Serialize;
use std::fmt;

/// Event sent to the session machine.
///
/// The first group is sent by callers; the second group is produced by the
/// machine itself when a network exchange or timer completes.
#[derive(Clone, PartialEq)]
pub enum AuthEvent {
    SignUpEmailPassword {
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
    PasswordlessSmsOtp {
        phone_number: String,
        otp: String,
    },
    SignInMfaTotp {
        ticket: Option<String>,
        otp: String,
    },
    SignInAnonymous,
    SignOut {
        all: bool,
    },
    TryToken {
        token: String,
    },

    SessionUnavailable,
    SignedIn {
        session: Session,
    },
    SignedOut {
        error: Option<ErrorPayload>,
    },
    TokenChanged {
        session: Session,
    },
    TokenRefreshFailed {
        error: ErrorPayload,
    },
    AwaitingEmailVerification,
    AwaitingSmsOtp,
    MfaRequired {
        challenge: MfaChallenge,
    },
    Deanonymized,
    AuthenticationFailed {
        error: ErrorPayload,
    },
}

impl AuthEvent {
    pub fn kind(&self) -> AuthEventKind {
        match self {
            AuthEvent::SignUpEmailPassword { .. } => AuthEventKind::SignUpEmailPassword,
            AuthEvent::SignInPassword { .. } => AuthEventKind::SignInPassword,
            AuthEvent::PasswordlessEmail { .. } => AuthEventKind::PasswordlessEmail,
            AuthEvent::PasswordlessSms { .. } => AuthEventKind::PasswordlessSms,
            AuthEvent::PasswordlessSmsOtp { .. } => AuthEventKind::PasswordlessSmsOtp,
            AuthEvent::SignInMfaTotp { .. } => AuthEventKind::SignInMfaTotp,
            AuthEvent::SignInAnonymous => AuthEventKind::SignInAnonymous,
            AuthEvent::SignOut { .. } => AuthEventKind::SignOut,
            AuthEvent::TryToken { .. } => AuthEventKind::TryToken,
            AuthEvent::SessionUnavailable => AuthEventKind::SessionUnavailable,
            AuthEvent::SignedIn { .. } => AuthEventKind::SignedIn,
            AuthEvent::SignedOut { .. } => AuthEventKind::SignedOut,
            AuthEvent::TokenChanged { .. } => AuthEventKind::TokenChanged,
            AuthEvent::TokenRefreshFailed { .. } => AuthEventKind::TokenRefreshFailed,
            AuthEvent::AwaitingEmailVerification => AuthEventKind::AwaitingEmailVerification,
            AuthEvent::AwaitingSmsOtp => AuthEventKind::AwaitingSmsOtp,
            AuthEvent::MfaRequired { .. } => AuthEventKind::MfaRequired,
            AuthEvent::Deanonymized => AuthEventKind::Deanonymized,
            AuthEvent::AuthenticationFailed { .. } => AuthEventKind::AuthenticationFailed,
        }
    }
}

// Credentials and tokens never reach the logs.
impl fmt::Debug for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().as_str())
    }
}

/// Type tag of an [`AuthEvent`], recorded on every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    /// Synthetic kind of the snapshot that exists before any event.
    Init,
    #[serde(rename = "SIGNUP_EMAIL_PASSWORD")]
    SignUpEmailPassword,
    #[serde(rename = "SIGNIN_PASSWORD")]
    SignInPassword,
    PasswordlessEmail,
    PasswordlessSms,
    PasswordlessSmsOtp,
    #[serde(rename = "SIGNIN_MFA_TOTP")]
    SignInMfaTotp,
    #[serde(rename = "SIGNIN_ANONYMOUS")]
    SignInAnonymous,
    #[serde(rename = "SIGNOUT")]
    SignOut,
    TryToken,
    SessionUnavailable,
    SignedIn,
    SignedOut,
    TokenChanged,
    TokenRefreshFailed,
    AwaitingEmailVerification,
    AwaitingSmsOtp,
    MfaRequired,
    Deanonymized,
    AuthenticationFailed,
}

impl AuthEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::Init => "INIT",
            AuthEventKind::SignUpEmailPassword => "SIGNUP_EMAIL_PASSWORD",
            AuthEventKind::SignInPassword => "SIGNIN_PASSWORD",
            AuthEventKind::PasswordlessEmail => "PASSWORDLESS_EMAIL",
            AuthEventKind::PasswordlessSms => "PASSWORDLESS_SMS",
            AuthEventKind::PasswordlessSmsOtp => "PASSWORDLESS_SMS_OTP",
            AuthEventKind::SignInMfaTotp => "SIGNIN_MFA_TOTP",
            AuthEventKind::SignInAnonymous => "SIGNIN_ANONYMOUS",
            AuthEventKind::SignOut => "SIGNOUT",
            AuthEventKind::TryToken => "TRY_TOKEN",
            AuthEventKind::SessionUnavailable => "SESSION_UNAVAILABLE",
            AuthEventKind::SignedIn => "SIGNED_IN",
            AuthEventKind::SignedOut => "SIGNED_OUT",
            AuthEventKind::TokenChanged => "TOKEN_CHANGED",
            AuthEventKind::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            AuthEventKind::AwaitingEmailVerification => "AWAITING_EMAIL_VERIFICATION",
            AuthEventKind::AwaitingSmsOtp => "AWAITING_SMS_OTP",
            AuthEventKind::MfaRequired => "MFA_REQUIRED",
            AuthEventKind::Deanonymized => "DEANONYMIZED",
            AuthEventKind::AuthenticationFailed => "AUTHENTICATION_FAILED",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_credentials() {
        let event = AuthEvent::SignInPassword {
            email: "joe@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", event);
        assert_eq!(rendered, "SIGNIN_PASSWORD");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_serialized_kind_matches_as_str() {
        for kind in [
            AuthEventKind::SignUpEmailPassword,
            AuthEventKind::SignInMfaTotp,
            AuthEventKind::SignOut,
            AuthEventKind::TokenChanged,
            AuthEventKind::PasswordlessSmsOtp,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
        }
    }
}
