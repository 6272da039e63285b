//! Register / login / logout.
//!
//! Successful register and login store `{access, refresh, user}` and
//! broadcast `SignedIn`. Failures leave the session untouched. Logout always
//! clears locally; telling the server is best effort.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, FieldErrors, SessionEvent};
use crate::models::User;

use super::Session;

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "Username is required.");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration form. `password_confirm` is only checked locally.
#[derive(Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub password_confirm: Option<String>,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            password_confirm: None,
        }
    }

    pub fn with_confirmation(mut self, confirm: impl Into<String>) -> Self {
        self.password_confirm = Some(confirm.into());
        self
    }

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", "Username is required.");
        }
        if !looks_like_email(&self.email) {
            errors.add("email", "Enter a valid email address.");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required.");
        }
        if let Some(ref confirm) = self.password_confirm {
            if confirm != &self.password {
                errors.add("password_confirm", "Passwords do not match.");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Loose sanity check; the server does the real validation.
pub(crate) fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(' '),
        None => false,
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    user: User,
    access: String,
    refresh: String,
}

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    logout_path: Option<Vec<String>>,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            logout_path: None,
        }
    }

    /// Notify the server at `path` (e.g. `auth/logout/`) on logout.
    pub fn with_logout_path(mut self, path: &str) -> Self {
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.logout_path = (!segments.is_empty()).then_some(segments);
        self
    }

    pub async fn register(&self, new_user: &NewUser) -> Result<User, ApiError> {
        new_user.validate().map_err(ApiError::Validation)?;
        let request = ApiRequest::post(
            vec!["auth".into(), "register".into()],
            serde_json::to_value(new_user)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))?,
        );
        self.authenticate(request, &new_user.username).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        credentials.validate().map_err(ApiError::Validation)?;
        let request = ApiRequest::post(
            vec!["auth".into(), "login".into()],
            json!({
                "username": credentials.username.trim(),
                "password": credentials.password,
            }),
        );
        self.authenticate(request, &credentials.username).await
    }

    async fn authenticate(&self, request: ApiRequest, username: &str) -> Result<User, ApiError> {
        let response = match self.client.send_public(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(username = username, error = %err, "Authentication failed");
                return Err(err);
            }
        };
        let auth: AuthResponse = response.json()?;

        let session = Session::authenticated(auth.access, Some(auth.refresh), auth.user.clone());
        self.client.store().save(&session)?;

        info!(user_id = auth.user.id, username = %auth.user.username, "Signed in");
        self.client.emit(SessionEvent::SignedIn(auth.user.clone()));
        Ok(auth.user)
    }

    /// Clear the local session. Server notification failures are logged and ignored.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let session = self.client.session();

        if let (Some(segments), Some(refresh)) = (&self.logout_path, session.refresh_token()) {
            let request = ApiRequest::post(segments.clone(), json!({ "refresh": refresh }))
                .with_bearer(session.access_token().map(str::to_string));
            if let Err(e) = self.client.send_public(request).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        self.client.store().clear()?;
        info!("Signed out");
        self.client.emit(SessionEvent::SignedOut);
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.client.session().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.session().is_authenticated()
    }
}
