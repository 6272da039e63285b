//! Scripted transport and fixtures shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::auth::Session;
use crate::models::User;

const REFRESH_PATH: &str = "auth/token/refresh/";

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Records every request and answers with a caller-supplied handler.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
    refresh_yields: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        Self::with_handler(move |request| Ok(handler(request)))
    }

    pub(crate) fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            refresh_yields: AtomicUsize::new(0),
        })
    }

    /// Make refresh calls yield to the scheduler `yields` times before
    /// answering, so concurrent requests pile up behind them.
    pub(crate) fn delay_refresh(self: Arc<Self>, yields: usize) -> Arc<Self> {
        self.refresh_yields.store(yields, Ordering::SeqCst);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests sent to `path` (e.g. `"auth/token/refresh/"`).
    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path() == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if request.path() == REFRESH_PATH {
            for _ in 0..self.refresh_yields.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        }
        (self.handler)(request)
    }
}

pub(crate) fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

pub(crate) fn alice() -> User {
    User {
        id: 1,
        username: "alice".to_string(),
        email: None,
    }
}

pub(crate) fn alice_session(access: &str, refresh: Option<&str>) -> Session {
    Session::authenticated(access.to_string(), refresh.map(str::to_string), alice())
}

/// JSON for a post written by `author_id`.
pub(crate) fn post_json(id: i64, author_id: i64, title: &str) -> Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "content": format!("Body of {}", title),
        "author": { "id": author_id, "username": format!("user{}", author_id) },
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
        "comments_count": 0
    })
}
