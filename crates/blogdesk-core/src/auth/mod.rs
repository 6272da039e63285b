//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: access/refresh credentials plus the signed-in user
//! - `SessionStore`: persistence, with file, keychain and in-memory backends
//! - `AuthService`: register, login and logout
//!
//! Sessions have no client-side expiry; the access credential is used until
//! the server rejects it and the API client refreshes it.

pub mod credentials;
pub mod service;
pub mod session;
pub mod store;

pub use credentials::KeyringSessionStore;
pub use service::{AuthService, Credentials, NewUser};
pub use session::Session;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
