//! REST API access for the blog backend.
//!
//! `ApiClient` wraps a [`Transport`] and owns the authorization-retry
//! protocol: bearer attachment, one deduplicated token refresh on 401, and a
//! single replay of the rejected request.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, SessionEvent, DEFAULT_PAGE_SIZE};
pub use error::{ApiError, FieldErrors};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
