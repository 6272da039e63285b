//! Data models for blog entities.
//!
//! - `User`, `Author`, `ProfileUser`, `UserProfile`: account records
//! - `Post`, `Comment` and their request bodies
//! - `PaginatedResult`: one page of a list endpoint

pub mod page;
pub mod post;
pub mod user;

pub use page::{PageEnvelope, PaginatedResult};
pub use post::{Comment, NewComment, NewPost, Post, PostUpdate, TITLE_MAX_CHARS};
pub use user::{Author, ProfileUser, User, UserProfile};
