use serde::Deserialize;
use serde_json::json;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{Comment, NewComment};

use super::posts::post_path;

/// The comment list comes back bare or wrapped in a page envelope,
/// depending on the backend's pagination settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum CommentList {
    Plain(Vec<Comment>),
    Paged { results: Vec<Comment> },
}

impl CommentList {
    fn into_vec(self) -> Vec<Comment> {
        match self {
            CommentList::Plain(comments) => comments,
            CommentList::Paged { results } => results,
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    client: ApiClient,
}

impl CommentService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Comments on a post, oldest first
    pub async fn list(&self, post_id: i64) -> Result<Vec<Comment>, ApiError> {
        let list: CommentList = self.client.fetch(ApiRequest::get(comments_path(post_id))).await?;
        let mut comments = list.into_vec();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    /// Blank content (after trimming) is rejected before any request is made.
    pub async fn create(&self, post_id: i64, content: &str) -> Result<Comment, ApiError> {
        let comment = NewComment::parse(content).map_err(ApiError::Validation)?;
        let request = ApiRequest::post(comments_path(post_id), json!({ "content": comment.content }));
        self.client.fetch(request).await
    }
}

fn comments_path(post_id: i64) -> Vec<String> {
    let mut path = post_path(post_id);
    path.push("comments".into());
    path
}
