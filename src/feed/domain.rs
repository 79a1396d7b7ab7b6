// Feed pagination types - no I/O
use crate::db::models::Item;
use crate::error::AppError;

/// Opaque pagination marker handed back to the page source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Nothing fetched yet
    Start,
    /// 1-based page number (external image source)
    Page(u32),
    /// Last document of the previous page (document store): its ordering
    /// key and its id
    After { key: String, id: String },
}

impl Cursor {
    /// Page number this cursor asks for, treating `Start` as page 1.
    pub fn page_number(&self) -> u32 {
        match self {
            Cursor::Page(n) => *n,
            _ => 1,
        }
    }
}

/// One page as returned by a source.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Item>,
    pub next_cursor: Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A previous fetch has not resolved yet
    Loading,
    /// A short page was seen; the stream is considered finished
    Exhausted,
    /// The owning view was torn down
    Detached,
}

/// Result of one `fetch_next_page` call.
#[derive(Debug)]
pub enum FetchOutcome {
    /// No request was issued
    Skipped(SkipReason),
    Fetched {
        fetched: usize,
        total: usize,
        exhausted: bool,
    },
    /// The response arrived after teardown and was dropped
    Discarded,
    /// The request failed; cursor and exhaustion are unchanged
    Failed(AppError),
}
