//! Authenticated API client.
//!
//! `ApiClient` is the single chokepoint for outbound calls. It attaches the
//! session's access credential as a bearer token and, when a protected call
//! comes back 401, runs one refresh-and-replay:
//!
//! 1. No refresh credential: the 401 surfaces as `Unauthenticated`.
//! 2. Another request already swapped the access credential: replay with it.
//! 3. Otherwise join (or start) the single in-flight refresh. On success the
//!    request is replayed once; on failure the session is cleared, an
//!    `Expired` event is broadcast and the caller gets `SessionExpired`.
//!    If the session was signed out or replaced while the refresh ran, its
//!    outcome is dropped and the caller gets `Unauthenticated`.
//!
//! A replay that is rejected again fails with `Unauthenticated`; nothing is
//! retried twice.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::{Session, SessionStore};
use crate::models::User;

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

/// Default page size; matches the backend's paginator.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Buffered session events per subscriber before old ones are dropped.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session lifecycle notifications for whatever renders the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(User),
    /// The access credential was replaced after a 401.
    Refreshed,
    SignedOut,
    /// Refresh failed and the session was cleared. The UI should route to login.
    Expired,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    // Only present when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    Expired,
    /// The session was signed out or replaced while the refresh ran.
    Superseded,
}

type RefreshFuture = Shared<BoxFuture<'static, RefreshOutcome>>;

/// The refresh currently in flight, tagged so only the matching waiter clears it.
struct InFlightRefresh {
    generation: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct RefreshSlot {
    next_generation: u64,
    current: Option<InFlightRefresh>,
}

/// API client for the blog backend.
/// Clone is cheap - all state lives behind `Arc`s and is shared between clones.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    refresh_slot: Arc<Mutex<RefreshSlot>>,
    page_size: u32,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            store,
            events,
            refresh_slot: Arc::new(Mutex::new(RefreshSlot::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Current persisted session.
    pub fn session(&self) -> Session {
        self.store.load()
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Send a request exactly as given: no credential is attached and a 401
    /// is not treated as an expired session. Used for login, register and
    /// the token refresh itself.
    pub async fn send_public(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.send(&request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_public_status(response.status, &response.body))
        }
    }

    /// Send a request with the session's access credential, running the
    /// refresh-and-replay protocol on 401.
    ///
    /// Requests that waited on a failed refresh get `SessionExpired`. A 401
    /// that lands after that refresh already cleared the session finds no
    /// refresh credential and gets `Unauthenticated`. Both are auth failures
    /// (see [`ApiError::is_auth_failure`]).
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let session = self.store.load();
        let sent_with = session.access_token().map(str::to_string);
        let request = request.with_bearer(sent_with.clone());

        let response = self.transport.send(&request).await?;
        if response.status != 401 {
            return Self::check_response(response);
        }

        let path = request.path();
        debug!(method = %request.method, path = %path, "Request rejected with 401");

        // Re-read: a concurrent request may have refreshed or cleared the session
        let current = self.store.load();
        if let Some(access) = current.access_token() {
            if sent_with.as_deref() != Some(access) {
                debug!(path = %path, "Access credential changed while in flight, replaying");
                return self.replay(request, access.to_string()).await;
            }
        }

        let Some(refresh_token) = current.refresh_token().filter(|_| sent_with.is_some()) else {
            return Err(ApiError::Unauthenticated);
        };

        match self.refresh(refresh_token.to_string()).await {
            RefreshOutcome::Refreshed(access) => self.replay(request, access).await,
            RefreshOutcome::Expired => Err(ApiError::SessionExpired),
            RefreshOutcome::Superseded => Err(ApiError::Unauthenticated),
        }
    }

    /// Send and decode a JSON body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    /// Send and discard the body (e.g. DELETE returning 204).
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    async fn replay(&self, request: ApiRequest, access: String) -> Result<ApiResponse, ApiError> {
        let request = request.with_bearer(Some(access));
        let response = self.transport.send(&request).await?;
        if response.status == 401 {
            warn!(path = %request.path(), "Replayed request rejected again");
            return Err(ApiError::Unauthenticated);
        }
        Self::check_response(response)
    }

    /// Join the in-flight refresh, or start one if none is running.
    async fn refresh(&self, refresh_token: String) -> RefreshOutcome {
        let (generation, future) = {
            let mut guard = self.refresh_slot.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = &mut *guard;
            match slot.current {
                Some(ref in_flight) => (in_flight.generation, in_flight.future.clone()),
                None => {
                    let generation = slot.next_generation;
                    slot.next_generation += 1;
                    let future = Self::run_refresh(
                        Arc::clone(&self.transport),
                        Arc::clone(&self.store),
                        self.events.clone(),
                        refresh_token,
                    )
                    .boxed()
                    .shared();
                    slot.current = Some(InFlightRefresh {
                        generation,
                        future: future.clone(),
                    });
                    (generation, future)
                }
            }
        };

        let outcome = future.await;

        let mut slot = self.refresh_slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.current.as_ref().is_some_and(|f| f.generation == generation) {
            slot.current = None;
        }
        outcome
    }

    async fn run_refresh(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        events: broadcast::Sender<SessionEvent>,
        refresh_token: String,
    ) -> RefreshOutcome {
        info!("Refreshing access credential");
        let request = ApiRequest::post(
            vec!["auth".into(), "token".into(), "refresh".into()],
            json!({ "refresh": refresh_token.as_str() }),
        );

        let result = match transport.send(&request).await {
            Ok(response) if response.is_success() => response.json::<RefreshResponse>(),
            Ok(response) => Err(ApiError::from_public_status(response.status, &response.body)),
            Err(err) => Err(err),
        };

        // The outcome only belongs to the session that started the refresh
        let mut session = store.load();
        if session.refresh_token() != Some(refresh_token.as_str()) {
            debug!("Session replaced or cleared during refresh, discarding outcome");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(tokens) => {
                session.replace_access(tokens.access.clone(), tokens.refresh);
                if let Err(e) = store.save(&session) {
                    // The old credential may already be rotated out server-side
                    warn!(error = %e, "Failed to persist refreshed session, signing out");
                    return Self::expire(&store, &events);
                }
                let _ = events.send(SessionEvent::Refreshed);
                RefreshOutcome::Refreshed(tokens.access)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, clearing session");
                Self::expire(&store, &events)
            }
        }
    }

    fn expire(store: &Arc<dyn SessionStore>, events: &broadcast::Sender<SessionEvent>) -> RefreshOutcome {
        if let Err(e) = store.clear() {
            warn!(error = %e, "Failed to clear session after refresh failure");
        }
        let _ = events.send(SessionEvent::Expired);
        RefreshOutcome::Expired
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }
}
