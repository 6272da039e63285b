use tracing::debug;

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{PageEnvelope, PaginatedResult, Post};

/// Free-text search over post titles and content.
#[derive(Clone)]
pub struct SearchService {
    client: ApiClient,
}

impl SearchService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// A blank query returns an empty page without asking the server.
    pub async fn search(&self, query: &str, page: u32) -> Result<PaginatedResult<Post>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Blank search query, skipping request");
            return Ok(PaginatedResult::empty());
        }

        let page = page.max(1);
        let request = ApiRequest::get(vec!["search".into()])
            .with_query("q", query)
            .with_query("page", page);
        let envelope: PageEnvelope<Post> = self.client.fetch(request).await?;
        Ok(PaginatedResult::from_envelope(envelope, page, self.client.page_size()))
    }
}
