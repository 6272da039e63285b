use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Post, User};

/// Client-held authentication state.
///
/// The access credential and the user record are either both present or
/// both absent. The fields are private so that invariant can only be built
/// through [`Session::empty`] and [`Session::authenticated`]; a stored record
/// that breaks it fails to deserialize.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredSession", into = "StoredSession")]
pub struct Session {
    access: Option<String>,
    refresh: Option<String>,
    user: Option<User>,
}

/// On-disk layout. Key names are part of the persisted format.
#[derive(Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

impl TryFrom<StoredSession> for Session {
    type Error = String;

    fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
        match (stored.access_token, stored.user) {
            (Some(access), Some(user)) => Ok(Session::authenticated(access, stored.refresh_token, user)),
            (None, None) => Ok(Session::empty()),
            (Some(_), None) => Err("stored session has a credential but no user".to_string()),
            (None, Some(_)) => Err("stored session has a user but no credential".to_string()),
        }
    }
}

impl From<Session> for StoredSession {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.access,
            refresh_token: session.refresh,
            user: session.user,
        }
    }
}

impl Session {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn authenticated(access: String, refresh: Option<String>, user: User) -> Self {
        Self {
            access: Some(access),
            refresh,
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access.is_some()
    }

    /// Get the bearer token if signed in
    pub fn access_token(&self) -> Option<&str> {
        self.access.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Get the user ID if signed in
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Swap in a refreshed access credential (and a rotated refresh
    /// credential, if the server sent one). Returns false and changes nothing
    /// on an empty session.
    pub fn replace_access(&mut self, access: String, rotated_refresh: Option<String>) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.access = Some(access);
        if rotated_refresh.is_some() {
            self.refresh = rotated_refresh;
        }
        true
    }

    /// Replace the stored user record (e.g. after a profile edit). Ignored on
    /// an empty session or when `user` is a different account.
    pub fn update_user(&mut self, user: User) -> bool {
        match self.user {
            Some(ref current) if current.id == user.id => {
                self.user = Some(user);
                true
            }
            _ => false,
        }
    }

    /// UI gate for edit/delete controls. The server enforces the real check.
    pub fn can_edit(&self, post: &Post) -> bool {
        self.user.as_ref().is_some_and(|u| post.is_authored_by(u))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access", &self.access.as_ref().map(|_| "<redacted>"))
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}
