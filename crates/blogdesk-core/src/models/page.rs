//! Page-number pagination.
//!
//! The backend answers list endpoints in two shapes: the stock envelope
//! (`count`, `next`, `previous`, `results`) and an explicit one that also
//! carries `total_pages`, `current_page`, `has_next` and `has_previous`.
//! Both are normalized into [`PaginatedResult`].

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Wire envelope shared by all paginated endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageEnvelope<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub has_previous: Option<bool>,
}

/// One page of results. `items.len() <= page_size` and `current_page >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> PaginatedResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            current_page: 1,
            total_pages: 1,
            has_next: false,
            has_previous: false,
        }
    }

    /// Normalize a wire envelope. `requested_page` and `page_size` fill in
    /// whatever the envelope leaves out.
    ///
    /// A response holding more than `page_size` items is an unpaginated
    /// list; it is paged locally so every item stays reachable.
    pub fn from_envelope(envelope: PageEnvelope<T>, requested_page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        if envelope.results.len() > page_size as usize {
            return Self::paged_locally(envelope.results, requested_page, page_size);
        }

        let current_page = envelope.current_page.unwrap_or(requested_page).max(1);

        let computed_pages = envelope.count.div_ceil(u64::from(page_size));
        let total_pages = envelope
            .total_pages
            .unwrap_or_else(|| u32::try_from(computed_pages).unwrap_or(u32::MAX))
            .max(1);

        let has_next = envelope
            .has_next
            .or(envelope.next.as_ref().map(|_| true))
            .unwrap_or(current_page < total_pages);
        let has_previous = envelope
            .has_previous
            .or(envelope.previous.as_ref().map(|_| true))
            .unwrap_or(current_page > 1);

        Self {
            items: envelope.results,
            total_count: envelope.count,
            current_page,
            total_pages,
            has_next,
            has_previous,
        }
    }

    /// Cut the `requested_page` window out of a full result list.
    fn paged_locally(results: Vec<T>, requested_page: u32, page_size: u32) -> Self {
        let total = results.len();
        let size = page_size as usize;
        let total_pages = u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX).max(1);
        let current_page = requested_page.clamp(1, total_pages);
        debug!(
            received = total,
            page_size = page_size,
            page = current_page,
            "Unpaginated response, paging locally"
        );

        let start = (current_page as usize - 1) * size;
        let items: Vec<T> = results.into_iter().skip(start).take(size).collect();

        Self {
            items,
            total_count: total as u64,
            current_page,
            total_pages,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then(|| self.current_page + 1)
    }

    pub fn previous_page(&self) -> Option<u32> {
        (self.has_previous && self.current_page > 1).then(|| self.current_page - 1)
    }
}

impl<T> Default for PaginatedResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}
