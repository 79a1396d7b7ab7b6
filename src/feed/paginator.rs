use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::domain::{Cursor, FetchOutcome, Page, SkipReason};
use crate::db::models::{Item, ItemId};
use crate::error::AppResult;

/// Where a feed's pages come from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: &Cursor, page_size: usize) -> AppResult<Page>;
}

#[derive(Debug)]
struct FeedState {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
    cursor: Cursor,
    loading: bool,
    exhausted: bool,
    detached: bool,
}

impl FeedState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            cursor: Cursor::Start,
            loading: false,
            exhausted: false,
            detached: false,
        }
    }

    /// Union by identity. A repeated identity keeps its original position
    /// and takes the newer fields.
    fn merge(&mut self, incoming: Vec<Item>) {
        for item in incoming {
            match self.index.get(&item.id) {
                Some(&pos) => self.items[pos] = item,
                None => {
                    self.index.insert(item.id.clone(), self.items.len());
                    self.items.push(item);
                }
            }
        }
    }
}

/// Accumulates pages from a source into a deduplicated item list.
///
/// End of stream is a heuristic: a page shorter than the requested size
/// marks the feed exhausted. A short page that is not the last one (for
/// example a page thinned by server-side filtering) ends pagination early.
///
/// There is no timeout. A fetch that never resolves keeps the loading guard
/// set and blocks further pages for this instance.
pub struct FeedPaginator {
    source: Arc<dyn PageSource>,
    page_size: usize,
    state: Mutex<FeedState>,
}

impl FeedPaginator {
    pub fn new(source: Arc<dyn PageSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            state: Mutex::new(FeedState::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn fetch_next_page(&self) -> FetchOutcome {
        let cursor = {
            let mut state = self.state.lock().await;
            if state.detached {
                return FetchOutcome::Skipped(SkipReason::Detached);
            }
            if state.loading {
                return FetchOutcome::Skipped(SkipReason::Loading);
            }
            if state.exhausted {
                return FetchOutcome::Skipped(SkipReason::Exhausted);
            }
            state.loading = true;
            state.cursor.clone()
        };

        let result = self.source.fetch_page(&cursor, self.page_size).await;

        let mut state = self.state.lock().await;
        state.loading = false;

        if state.detached {
            tracing::debug!("Dropping page that arrived after teardown");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(page) => {
                let fetched = page.items.len();
                let exhausted = fetched < self.page_size;
                state.merge(page.items);
                state.cursor = page.next_cursor;
                if exhausted {
                    state.exhausted = true;
                }
                tracing::info!(
                    "Merged page: {} fetched, {} total, exhausted={}",
                    fetched,
                    state.items.len(),
                    exhausted
                );
                FetchOutcome::Fetched {
                    fetched,
                    total: state.items.len(),
                    exhausted,
                }
            }
            Err(e) => {
                tracing::error!("Failed to fetch feed page: {}", e);
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Replace the cached copy of an item after it was changed elsewhere.
    /// Returns false when no item with that identity is loaded.
    pub async fn replace_item(&self, updated: Item) -> bool {
        let mut state = self.state.lock().await;
        match state.index.get(&updated.id) {
            Some(&pos) => {
                state.items[pos] = updated;
                true
            }
            None => false,
        }
    }

    /// Stop accepting results; responses still in flight are dropped.
    pub async fn detach(&self) {
        self.state.lock().await.detached = true;
    }

    pub async fn items(&self) -> Vec<Item> {
        self.state.lock().await.items.clone()
    }

    pub async fn get(&self, id: &ItemId) -> Option<Item> {
        let state = self.state.lock().await;
        state.index.get(id).map(|&pos| state.items[pos].clone())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn is_exhausted(&self) -> bool {
        self.state.lock().await.exhausted
    }

    pub async fn cursor(&self) -> Cursor {
        self.state.lock().await.cursor.clone()
    }
}
