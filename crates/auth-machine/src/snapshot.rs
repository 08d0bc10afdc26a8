//! Immutable snapshots of the session machine.

use crate::error::ErrorPayload;
use crate::event::AuthEventKind;
use crate::fsm::StateValue;
use crate::types::{MfaChallenge, Session, User};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Tag carried while the machine has not settled on an authentication outcome.
pub const LOADING_TAG: &str = "loading";

/// Current access token and when it stops being valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub value: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Current refresh token.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshToken {
    pub value: Option<String>,
}

/// Last error recorded per concern.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextErrors {
    pub authentication: Option<ErrorPayload>,
    pub token: Option<ErrorPayload>,
    pub signout: Option<ErrorPayload>,
}

/// Machine context: everything the session machine knows about the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub user: Option<User>,
    pub mfa: Option<MfaChallenge>,
    pub errors: ContextErrors,
}

impl AuthContext {
    /// Project the session out of the context.
    ///
    /// Only a complete triple (access token, refresh token, user) is a session.
    pub fn session(&self) -> Option<Session> {
        let access_token = self.access_token.value.clone()?;
        let refresh_token = self.refresh_token.value.clone()?;
        let user = self.user.clone()?;
        let access_token_expires_in = self
            .access_token
            .expires_at
            .map(|at| (at - Utc::now()).num_seconds().max(0))
            .unwrap_or(0);

        Some(Session {
            access_token,
            access_token_expires_in,
            refresh_token,
            user,
        })
    }

    pub(crate) fn apply_session(&mut self, session: &Session) {
        self.access_token = AccessToken {
            value: Some(session.access_token.clone()),
            expires_at: Some(
                Utc::now() + chrono::Duration::seconds(session.access_token_expires_in),
            ),
        };
        self.refresh_token = RefreshToken {
            value: Some(session.refresh_token.clone()),
        };
        self.user = Some(session.user.clone());
        self.mfa = None;
    }

    pub(crate) fn clear_session(&mut self) {
        self.access_token = AccessToken::default();
        self.refresh_token = RefreshToken::default();
        self.user = None;
        self.mfa = None;
    }

    pub(crate) fn user_is_anonymous(&self) -> bool {
        self.user.as_ref().map(|u| u.is_anonymous).unwrap_or(false)
    }
}

/// State of the machine at one instant.
///
/// Produced on every accepted event, never mutated, superseded by the next one.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Strictly increasing across the lifetime of one machine.
    pub sequence: u64,
    pub value: StateValue,
    pub tags: Vec<&'static str>,
    pub context: AuthContext,
    /// Kind of the event whose transition produced this snapshot.
    pub event: AuthEventKind,
}

impl Snapshot {
    pub(crate) fn new(
        sequence: u64,
        value: StateValue,
        context: AuthContext,
        event: AuthEventKind,
    ) -> Self {
        let mut tags = Vec::new();
        if value.authentication.is_loading() {
            tags.push(LOADING_TAG);
        }
        Self {
            sequence,
            value,
            tags,
            context,
            event,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.value.matches(path)
    }

    pub fn is_loading(&self) -> bool {
        self.has_tag(LOADING_TAG)
    }

    pub fn session(&self) -> Option<Session> {
        self.context.session()
    }

    pub fn user(&self) -> Option<&User> {
        self.context.user.as_ref()
    }
}
