use serde_json::json;
use tracing::debug;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{NewPost, PageEnvelope, PaginatedResult, Post, PostUpdate};

/// Post listing and CRUD.
#[derive(Clone)]
pub struct PostService {
    client: ApiClient,
}

impl PostService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetch one page of all posts, newest first
    pub async fn list(&self, page: u32) -> Result<PaginatedResult<Post>, ApiError> {
        self.list_at(vec!["posts".into()], page).await
    }

    /// Fetch one page of the signed-in user's own posts
    pub async fn list_mine(&self, page: u32) -> Result<PaginatedResult<Post>, ApiError> {
        self.list_at(vec!["posts".into(), "user".into()], page).await
    }

    async fn list_at(&self, segments: Vec<String>, page: u32) -> Result<PaginatedResult<Post>, ApiError> {
        let page = page.max(1);
        let request = ApiRequest::get(segments).with_query("page", page);
        let envelope: PageEnvelope<Post> = self.client.fetch(request).await?;
        Ok(PaginatedResult::from_envelope(envelope, page, self.client.page_size()))
    }

    /// Fetch a single post including its comments
    pub async fn get(&self, id: i64) -> Result<Post, ApiError> {
        self.client.fetch(ApiRequest::get(post_path(id))).await
    }

    pub async fn create(&self, post: &NewPost) -> Result<Post, ApiError> {
        post.validate().map_err(ApiError::Validation)?;
        let request = ApiRequest::post(
            vec!["posts".into()],
            json!({ "title": post.title.trim(), "content": post.content }),
        );
        let created: Post = self.client.fetch(request).await?;
        debug!(post_id = created.id, "Post created");
        Ok(created)
    }

    /// Author-only; the server answers 403 for anyone else.
    pub async fn update(&self, id: i64, update: &PostUpdate) -> Result<Post, ApiError> {
        update.validate().map_err(ApiError::Validation)?;
        let body = serde_json::to_value(update)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        self.client.fetch(ApiRequest::put(post_path(id), body)).await
    }

    /// Author-only; the server answers 403 for anyone else.
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.execute(ApiRequest::delete(post_path(id))).await?;
        debug!(post_id = id, "Post deleted");
        Ok(())
    }
}

pub(crate) fn post_path(id: i64) -> Vec<String> {
    vec!["posts".into(), id.to_string()]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::ApiResponse;
    use crate::auth::MemorySessionStore;
    use crate::test_support::{alice_session, post_json, respond, ScriptedTransport};

    fn service(transport: &Arc<ScriptedTransport>) -> PostService {
        let store = Arc::new(MemorySessionStore::with_session(alice_session("A1", Some("R1"))));
        PostService::new(ApiClient::new(transport.clone(), store))
    }

    #[tokio::test]
    async fn test_list_posts_page() {
        let transport = ScriptedTransport::new(|_| {
            respond(200, json!({
                "count": 12,
                "next": null,
                "previous": "http://localhost:8000/api/posts/",
                "results": [post_json(2, 1, "Second"), post_json(1, 1, "First")]
            }))
        });

        let page = service(&transport).list(2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title, "Second");
        assert_eq!(page.total_count, 12);
        assert_eq!(page.current_page, 2);
        assert!(!page.has_next);
        assert!(page.has_previous);

        let request = &transport.requests()[0];
        assert_eq!(request.path(), "posts/");
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn test_page_zero_is_clamped() {
        let transport = ScriptedTransport::new(|_| respond(200, json!({ "count": 0, "results": [] })));
        let page = service(&transport).list_mine(0).await.unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(transport.requests()[0].path(), "posts/user/");
        assert_eq!(transport.requests()[0].query[0].1, "1");
    }

    #[tokio::test]
    async fn test_create_sends_title_and_content() {
        let transport = ScriptedTransport::new(|_| respond(201, post_json(5, 1, "Hello")));

        let post = service(&transport).create(&NewPost::new(" Hello ", "World")).await.unwrap();
        assert_eq!(post.id, 5);

        let request = &transport.requests()[0];
        assert_eq!(request.bearer.as_deref(), Some("A1"));
        assert_eq!(request.body, Some(json!({ "title": "Hello", "content": "World" })));
    }

    #[tokio::test]
    async fn test_invalid_post_never_reaches_network() {
        let transport = ScriptedTransport::new(|_| respond(201, json!({})));
        let err = service(&transport).create(&NewPost::new("", "body")).await.unwrap_err();
        assert!(err.field_errors().unwrap().get("title").is_some());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_forbidden() {
        let transport = ScriptedTransport::new(|_| {
            respond(403, json!({ "detail": "You can only edit your own posts." }))
        });
        let update = PostUpdate { title: Some("Mine now".into()), content: None };

        let err = service(&transport).update(9, &update).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == "You can only edit your own posts."));

        let request = &transport.requests()[0];
        assert_eq!(request.path(), "posts/9/");
        assert_eq!(request.body, Some(json!({ "title": "Mine now" })));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let transport = ScriptedTransport::new(|_| ApiResponse::new(204, ""));
        service(&transport).delete(3).await.unwrap();
        assert_eq!(transport.requests()[0].path(), "posts/3/");
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found() {
        let transport = ScriptedTransport::new(|_| respond(404, json!({ "detail": "Not found." })));
        let err = service(&transport).get(404).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
