//! Transition tables for the session machine's two regions, using rust-fsm.
//!
//! The machine runs two orthogonal regions side by side. Each region is a flat
//! rust-fsm table; the interpreter uses the generated `Impl::transition` as a
//! pure transition function and keeps the richer sub-state (why the user is
//! signed out, which flow is authenticating) next to it.
//!
//! ## Authentication region
//!
//! ```text
//!                    ┌──────────────┐
//!                    │   Starting   │ (initial, loading)
//!                    └──────┬───────┘
//!        NoSession          │          SessionObtained
//!          ┌────────────────┴─────────────────┐
//!          ▼                                  ▼
//! ┌─────────────────┐  SessionObtained  ┌─────────────────┐
//! │    SignedOut    │ ────────────────► │    SignedIn     │
//! └────────┬────────┘                   └──┬──────────┬───┘
//!          │ Authenticate      Deanonymize │          │ SignOut
//!          ▼                               ▼          ▼
//! ┌─────────────────┐                          ┌─────────────────┐
//! │ Authenticating  │ ── Settle ─► SignedOut   │   SigningOut    │
//! └─────────────────┘ ── SessionObtained / Resume ─► SignedIn     │
//!                                              └────────┬────────┘
//!                                                       │ SignOutComplete
//!                                                       ▼
//!                                                   SignedOut
//! ```
//!
//! ## Token region
//!
//! ```text
//! Idle ──Refresh──► Refreshing ──Refreshed──► Idle
//!                        │
//!                        └──Fail──► Failed ──Refresh──► Refreshing
//! ```

use rust_fsm::*;
use serde::Serialize;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub authentication_region(Starting)

    Starting => {
        SessionObtained => SignedIn,
        NoSession => SignedOut
    },
    SignedOut => {
        Authenticate => Authenticating,
        SessionObtained => SignedIn
    },
    Authenticating => {
        SessionObtained => SignedIn,
        // Flow ended without a session (failure, pending verification, MFA)
        Settle => SignedOut,
        // Deanonymization ended; the anonymous session is still valid
        Resume => SignedIn
    },
    SignedIn => {
        Deanonymize => Authenticating,
        SignOut => SigningOut,
        // Refresh token revoked server-side
        SessionLost => SignedOut
    },
    SigningOut => {
        SignOutComplete => SignedOut
    }
}

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub token_region(Idle)

    Idle => {
        Refresh => Refreshing,
        Reset => Idle
    },
    Refreshing => {
        Refreshed => Idle,
        Fail => Failed,
        Reset => Idle
    },
    Failed => {
        Refresh => Refreshing,
        Reset => Idle
    }
}

pub use authentication_region::Input as AuthenticationInput;
pub use authentication_region::State as AuthenticationPhase;
pub use token_region::Input as TokenInput;
pub use token_region::State as TokenPhase;

/// Pure transition function of the authentication region.
pub fn authentication_transition(
    phase: &AuthenticationPhase,
    input: &AuthenticationInput,
) -> Option<AuthenticationPhase> {
    authentication_region::Impl::transition(phase, input)
}

/// Pure transition function of the token region.
pub fn token_transition(phase: &TokenPhase, input: &TokenInput) -> Option<TokenPhase> {
    token_region::Impl::transition(phase, input)
}

/// Why the authentication region is signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SignedOutReason {
    NoErrors,
    Failed,
    NeedsEmailVerification,
    NeedsSmsOtp,
    NeedsMfa,
}

impl SignedOutReason {
    fn segment(&self) -> &'static str {
        match self {
            SignedOutReason::NoErrors => "noErrors",
            SignedOutReason::Failed => "failed",
            SignedOutReason::NeedsEmailVerification => "needsEmailVerification",
            SignedOutReason::NeedsSmsOtp => "needsSmsOtp",
            SignedOutReason::NeedsMfa => "needsMfa",
        }
    }
}

/// Which credential flow the authentication region is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthFlow {
    Password,
    PasswordlessEmail,
    PasswordlessSms,
    PasswordlessSmsOtp,
    MfaTotp,
    Anonymous,
    SignUp,
}

impl AuthFlow {
    fn segment(&self) -> &'static str {
        match self {
            AuthFlow::Password => "password",
            AuthFlow::PasswordlessEmail => "passwordlessEmail",
            AuthFlow::PasswordlessSms => "passwordlessSms",
            AuthFlow::PasswordlessSmsOtp => "passwordlessSmsOtp",
            AuthFlow::MfaTotp => "mfaTotp",
            AuthFlow::Anonymous => "anonymous",
            AuthFlow::SignUp => "signUp",
        }
    }
}

/// Hierarchical view of the authentication region for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationState {
    Starting,
    SignedOut(SignedOutReason),
    Authenticating(AuthFlow),
    SignedIn,
    SigningOut,
}

impl AuthenticationState {
    /// Dotted descriptor, e.g. `authentication.signedOut.needsMfa`.
    pub fn path(&self) -> String {
        match self {
            AuthenticationState::Starting => "authentication.starting".to_string(),
            AuthenticationState::SignedOut(reason) => {
                format!("authentication.signedOut.{}", reason.segment())
            }
            AuthenticationState::Authenticating(flow) => {
                format!("authentication.authenticating.{}", flow.segment())
            }
            AuthenticationState::SignedIn => "authentication.signedIn".to_string(),
            AuthenticationState::SigningOut => "authentication.signingOut".to_string(),
        }
    }

    /// Flat region state this view was derived from.
    pub fn phase(&self) -> AuthenticationPhase {
        match self {
            AuthenticationState::Starting => AuthenticationPhase::Starting,
            AuthenticationState::SignedOut(_) => AuthenticationPhase::SignedOut,
            AuthenticationState::Authenticating(_) => AuthenticationPhase::Authenticating,
            AuthenticationState::SignedIn => AuthenticationPhase::SignedIn,
            AuthenticationState::SigningOut => AuthenticationPhase::SigningOut,
        }
    }

    /// Returns true while a network exchange decides the authentication outcome.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            AuthenticationState::Starting
                | AuthenticationState::Authenticating(_)
                | AuthenticationState::SigningOut
        )
    }
}

/// View of the token region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenState {
    Idle,
    Error,
    Running,
}

impl TokenState {
    pub fn path(&self) -> &'static str {
        match self {
            TokenState::Idle => "token.idle.noErrors",
            TokenState::Error => "token.idle.error",
            TokenState::Running => "token.running",
        }
    }
}

impl From<&TokenPhase> for TokenState {
    fn from(phase: &TokenPhase) -> Self {
        match phase {
            TokenPhase::Idle => TokenState::Idle,
            TokenPhase::Refreshing => TokenState::Running,
            TokenPhase::Failed => TokenState::Error,
        }
    }
}

/// Full state descriptor across both regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateValue {
    pub authentication: AuthenticationState,
    pub token: TokenState,
}

impl StateValue {
    /// Segment-prefix match against either region.
    ///
    /// `authentication.signedOut` matches `authentication.signedOut.failed`,
    /// but `authentication.signed` matches nothing.
    pub fn matches(&self, path: &str) -> bool {
        let authentication = self.authentication.path();
        prefix_matches(&authentication, path) || prefix_matches(self.token.path(), path)
    }
}

fn prefix_matches(full: &str, query: &str) -> bool {
    match full.strip_prefix(query) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_states() {
        let authentication = authentication_region::StateMachine::new();
        let token = token_region::StateMachine::new();
        assert_eq!(*authentication.state(), AuthenticationPhase::Starting);
        assert_eq!(*token.state(), TokenPhase::Idle);
    }

    #[test]
    fn test_bootstrap_without_session() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::NoSession).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SignedOut);
    }

    #[test]
    fn test_sign_in_flow() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::NoSession).unwrap();

        machine.consume(&AuthenticationInput::Authenticate).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::Authenticating);

        machine.consume(&AuthenticationInput::SessionObtained).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SignedIn);
    }

    #[test]
    fn test_failed_flow_settles_signed_out() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::NoSession).unwrap();
        machine.consume(&AuthenticationInput::Authenticate).unwrap();

        machine.consume(&AuthenticationInput::Settle).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SignedOut);
    }

    #[test]
    fn test_cannot_authenticate_while_signed_in() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::SessionObtained).unwrap();

        assert!(machine.consume(&AuthenticationInput::Authenticate).is_err());
        assert_eq!(*machine.state(), AuthenticationPhase::SignedIn);
    }

    #[test]
    fn test_deanonymize_resumes_signed_in() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::SessionObtained).unwrap();

        machine.consume(&AuthenticationInput::Deanonymize).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::Authenticating);

        machine.consume(&AuthenticationInput::Resume).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SignedIn);
    }

    #[test]
    fn test_sign_out_flow() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::SessionObtained).unwrap();

        machine.consume(&AuthenticationInput::SignOut).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SigningOut);

        machine.consume(&AuthenticationInput::SignOutComplete).unwrap();
        assert_eq!(*machine.state(), AuthenticationPhase::SignedOut);
    }

    #[test]
    fn test_cannot_sign_out_when_signed_out() {
        let mut machine = authentication_region::StateMachine::new();
        machine.consume(&AuthenticationInput::NoSession).unwrap();

        assert!(machine.consume(&AuthenticationInput::SignOut).is_err());
    }

    #[test]
    fn test_token_refresh_is_single_flight() {
        let mut machine = token_region::StateMachine::new();
        machine.consume(&TokenInput::Refresh).unwrap();
        assert_eq!(*machine.state(), TokenPhase::Refreshing);

        // A second refresh while one is running is rejected
        assert!(machine.consume(&TokenInput::Refresh).is_err());
    }

    #[test]
    fn test_token_failure_allows_retry() {
        let mut machine = token_region::StateMachine::new();
        machine.consume(&TokenInput::Refresh).unwrap();
        machine.consume(&TokenInput::Fail).unwrap();
        assert_eq!(*machine.state(), TokenPhase::Failed);

        machine.consume(&TokenInput::Refresh).unwrap();
        assert_eq!(*machine.state(), TokenPhase::Refreshing);
    }

    #[test]
    fn test_late_refresh_result_after_reset_is_rejected() {
        let mut machine = token_region::StateMachine::new();
        machine.consume(&TokenInput::Refresh).unwrap();
        machine.consume(&TokenInput::Reset).unwrap();

        assert!(machine.consume(&TokenInput::Refreshed).is_err());
    }

    #[test]
    fn test_pure_transition_matches_machine() {
        assert_eq!(
            authentication_transition(
                &AuthenticationPhase::SignedOut,
                &AuthenticationInput::Authenticate
            ),
            Some(AuthenticationPhase::Authenticating)
        );
        assert_eq!(
            token_transition(&TokenPhase::Refreshing, &TokenInput::Refresh),
            None
        );
    }

    #[test]
    fn test_state_paths() {
        assert_eq!(
            AuthenticationState::SignedOut(SignedOutReason::NeedsMfa).path(),
            "authentication.signedOut.needsMfa"
        );
        assert_eq!(
            AuthenticationState::Authenticating(AuthFlow::PasswordlessSmsOtp).path(),
            "authentication.authenticating.passwordlessSmsOtp"
        );
        assert_eq!(TokenState::Error.path(), "token.idle.error");
    }

    #[test]
    fn test_matches_is_segment_prefix() {
        let value = StateValue {
            authentication: AuthenticationState::SignedOut(SignedOutReason::Failed),
            token: TokenState::Error,
        };

        assert!(value.matches("authentication"));
        assert!(value.matches("authentication.signedOut"));
        assert!(value.matches("authentication.signedOut.failed"));
        assert!(!value.matches("authentication.signed"));
        assert!(!value.matches("authentication.signedIn"));
        assert!(value.matches("token.idle"));
        assert!(value.matches("token.idle.error"));
        assert!(!value.matches("token.running"));
    }

    #[test]
    fn test_loading_states() {
        assert!(AuthenticationState::Starting.is_loading());
        assert!(AuthenticationState::Authenticating(AuthFlow::Anonymous).is_loading());
        assert!(AuthenticationState::SigningOut.is_loading());
        assert!(!AuthenticationState::SignedIn.is_loading());
        assert!(!AuthenticationState::SignedOut(SignedOutReason::NoErrors).is_loading());
    }
}
