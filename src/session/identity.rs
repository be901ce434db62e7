use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session store key for the signed-in user's email
pub const USER_EMAIL_KEY: &str = "userEmail";
/// Session store key for the signed-in user's id
pub const USER_ID_KEY: &str = "userId";

/// The currently authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier assigned by the backend
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// One notification from the auth stream: `Some` while signed in, `None` when signed out
pub type AuthChange = Option<Identity>;

/// Public-facing identity fields mirrored into the session-scoped store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarkers {
    pub user_email: String,
    pub user_id: String,
}

impl From<&Identity> for SessionMarkers {
    fn from(identity: &Identity) -> Self {
        Self {
            user_email: identity.email.clone(),
            user_id: identity.user_id.clone(),
        }
    }
}

/// A processed auth transition, published after the cache was updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionTransition {
    SignedIn {
        identity: Identity,
        at: DateTime<Utc>,
    },
    SignedOut {
        at: DateTime<Utc>,
    },
}

impl SessionTransition {
    pub fn from_change(change: &AuthChange) -> Self {
        match change {
            Some(identity) => SessionTransition::SignedIn {
                identity: identity.clone(),
                at: Utc::now(),
            },
            None => SessionTransition::SignedOut { at: Utc::now() },
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionTransition::SignedIn { identity, .. } => Some(identity),
            SessionTransition::SignedOut { .. } => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity().is_some()
    }
}
