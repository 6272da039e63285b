//! blogdesk-core - client library for the blog platform.
//!
//! - `api`: the authenticated HTTP client and its error model
//! - `auth`: sessions, session persistence and the auth service
//! - `models`: users, posts, comments and pagination
//! - `services`: posts, comments, search and profile endpoints
//! - `config`: on-disk configuration and client wiring
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use blogdesk_core::{Config, Credentials, PostService};
//!
//! let config = Config::load()?;
//! let client = config.build_client()?;
//! let auth = config.auth_service(client.clone());
//! auth.login(&Credentials::new("alice", "hunter2")).await?;
//!
//! let page = PostService::new(client).list(1).await?;
//! println!("{} posts", page.total_count);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, ApiError, FieldErrors, SessionEvent};
pub use auth::{AuthService, Credentials, NewUser, Session, SessionStore};
pub use config::{Config, SessionBackend};
pub use models::{Comment, NewPost, PaginatedResult, Post, PostUpdate, User, UserProfile};
pub use services::{CommentService, PostService, ProfileService, SearchService};
