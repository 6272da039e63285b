//! Resource services: typed request builders over [`ApiClient`].
//!
//! Each call maps straight onto one endpoint. Nothing is cached and nothing
//! is retried beyond the client's refresh-and-replay. Pages are 1-based;
//! a page number of 0 is treated as 1.
//!
//! [`ApiClient`]: crate::api::ApiClient

pub mod comments;
pub mod posts;
pub mod profile;
pub mod search;

pub use comments::CommentService;
pub use posts::PostService;
pub use profile::ProfileService;
pub use search::SearchService;
