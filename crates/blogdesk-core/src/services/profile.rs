use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, FieldErrors};
use crate::auth::service::looks_like_email;
use crate::models::{PageEnvelope, PaginatedResult, Post, ProfileUser, User, UserProfile};

#[derive(Deserialize)]
struct ProfileResponse {
    user: ProfileUser,
    posts: PageEnvelope<Post>,
}

#[derive(Deserialize)]
struct ProfileUpdateResponse {
    user: ProfileUser,
}

#[derive(Clone)]
pub struct ProfileService {
    client: ApiClient,
}

impl ProfileService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Public profile and one page of the user's posts. Unknown users are `NotFound`.
    pub async fn get(&self, username: &str, page: u32) -> Result<UserProfile, ApiError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ApiError::Validation(FieldErrors::single(
                "username",
                "Username is required.",
            )));
        }

        let page = page.max(1);
        let request = ApiRequest::get(vec!["users".into(), username.to_string()])
            .with_query("page", page);
        let response: ProfileResponse = self.client.fetch(request).await?;

        Ok(UserProfile {
            user: response.user,
            posts: PaginatedResult::from_envelope(response.posts, page, self.client.page_size()),
        })
    }

    /// Change the signed-in user's email and mirror it into the stored session.
    pub async fn update_email(&self, email: &str) -> Result<User, ApiError> {
        let email = email.trim();
        if !looks_like_email(email) {
            return Err(ApiError::Validation(FieldErrors::single(
                "email",
                "Enter a valid email address.",
            )));
        }

        let request = ApiRequest::put(
            vec!["profile".into(), "update".into()],
            json!({ "email": email }),
        );
        let response: ProfileUpdateResponse = match self.client.fetch(request).await {
            Ok(response) => response,
            // The form has one field, so a general 400 belongs to it
            Err(ApiError::Rejected(message)) => {
                return Err(ApiError::Validation(FieldErrors::single("email", &message)));
            }
            Err(e) => return Err(e),
        };

        let user = response.user.into_user();
        let mut session = self.client.session();
        if session.update_user(user.clone()) {
            if let Err(e) = self.client.store().save(&session) {
                warn!(error = %e, "Failed to persist updated user record");
            }
        }
        info!(user_id = user.id, "Profile updated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{MemorySessionStore, SessionStore};
    use crate::test_support::{alice_session, post_json, respond, ScriptedTransport};

    fn service(transport: &Arc<ScriptedTransport>, store: &Arc<MemorySessionStore>) -> ProfileService {
        ProfileService::new(ApiClient::new(transport.clone(), store.clone()))
    }

    #[tokio::test]
    async fn test_get_profile_with_posts() {
        let transport = ScriptedTransport::new(|_| {
            respond(200, json!({
                "user": {
                    "id": 2,
                    "username": "bob",
                    "email": null,
                    "date_joined": "2023-11-02T08:00:00Z",
                    "posts_count": 11
                },
                "posts": {
                    "results": [post_json(20, 2, "Latest")],
                    "count": 11,
                    "total_pages": 2,
                    "current_page": 2,
                    "has_next": false,
                    "has_previous": true
                }
            }))
        });
        let store = Arc::new(MemorySessionStore::new());

        let profile = service(&transport, &store).get("bob", 2).await.unwrap();
        assert_eq!(profile.user.username, "bob");
        assert_eq!(profile.user.email, None);
        assert_eq!(profile.user.posts_count, Some(11));
        assert_eq!(profile.posts.items.len(), 1);
        assert_eq!(profile.posts.current_page, 2);
        assert_eq!(transport.requests()[0].path(), "users/bob/");
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let transport = ScriptedTransport::new(|_| respond(404, json!({ "error": "User not found" })));
        let store = Arc::new(MemorySessionStore::new());

        let err = service(&transport, &store).get("ghost", 1).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
    }

    #[tokio::test]
    async fn test_update_email_updates_session() {
        let transport = ScriptedTransport::new(|_| {
            respond(200, json!({
                "user": {
                    "id": 1,
                    "username": "alice",
                    "email": "alice@new.example",
                    "date_joined": "2023-11-02T08:00:00Z"
                }
            }))
        });
        let store = Arc::new(MemorySessionStore::with_session(alice_session("A1", Some("R1"))));

        let user = service(&transport, &store).update_email(" alice@new.example ").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("alice@new.example"));

        let request = &transport.requests()[0];
        assert_eq!(request.path(), "profile/update/");
        assert_eq!(request.body, Some(json!({ "email": "alice@new.example" })));

        let session = store.load();
        assert_eq!(session.user().unwrap().email.as_deref(), Some("alice@new.example"));
        assert_eq!(session.access_token(), Some("A1"));
    }

    #[tokio::test]
    async fn test_taken_email_is_field_error() {
        let transport = ScriptedTransport::new(|_| respond(400, json!({ "error": "Email already taken" })));
        let store = Arc::new(MemorySessionStore::with_session(alice_session("A1", Some("R1"))));

        let err = service(&transport, &store).update_email("bob@example.com").await.unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("email").unwrap(),
            ["Email already taken"]
        );
        assert_eq!(store.load(), alice_session("A1", Some("R1")));
    }

    #[tokio::test]
    async fn test_invalid_email_skips_network() {
        let transport = ScriptedTransport::new(|_| respond(200, json!({})));
        let store = Arc::new(MemorySessionStore::with_session(alice_session("A1", Some("R1"))));

        let err = service(&transport, &store).update_email("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.requests().is_empty());
    }
}
