use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::domain::FetchOutcome;
use super::paginator::FeedPaginator;

/// Handle for one observed sentinel region. Only the most recently armed
/// sentinel can trigger a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sentinel(u64);

/// Visibility change reported for a sentinel.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityEvent {
    pub sentinel: Sentinel,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event from an observer that was already released
    StaleSentinel,
    NotVisible,
    InFlight,
    Exhausted,
    TornDown,
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Ignored(IgnoreReason),
    Fetched(FetchOutcome),
}

/// Requests the next feed page when the sentinel at the end of the list
/// becomes visible.
pub struct ScrollTrigger {
    feed: Arc<FeedPaginator>,
    next_sentinel: AtomicU64,
    // 0 = no live observer
    live: AtomicU64,
    fetching: AtomicBool,
    torn_down: AtomicBool,
}

impl ScrollTrigger {
    pub fn new(feed: Arc<FeedPaginator>) -> Self {
        Self {
            feed,
            next_sentinel: AtomicU64::new(1),
            live: AtomicU64::new(0),
            fetching: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn feed(&self) -> &Arc<FeedPaginator> {
        &self.feed
    }

    /// Observe a new sentinel, releasing the previous one. Call after every render.
    pub fn arm(&self) -> Sentinel {
        let id = self.next_sentinel.fetch_add(1, Ordering::SeqCst);
        let previous = self.live.swap(id, Ordering::SeqCst);
        if previous != 0 {
            tracing::trace!("Released sentinel {}", previous);
        }
        Sentinel(id)
    }

    /// The sentinel currently observed, if any.
    pub fn live_sentinel(&self) -> Option<Sentinel> {
        match self.live.load(Ordering::SeqCst) {
            0 => None,
            id => Some(Sentinel(id)),
        }
    }

    pub fn state(&self) -> TriggerState {
        if self.fetching.load(Ordering::SeqCst) {
            TriggerState::Fetching
        } else {
            TriggerState::Idle
        }
    }

    pub async fn on_visibility(&self, sentinel: Sentinel, visible: bool) -> TriggerOutcome {
        if self.torn_down.load(Ordering::SeqCst) {
            return TriggerOutcome::Ignored(IgnoreReason::TornDown);
        }
        if self.live.load(Ordering::SeqCst) != sentinel.0 {
            return TriggerOutcome::Ignored(IgnoreReason::StaleSentinel);
        }
        if !visible {
            return TriggerOutcome::Ignored(IgnoreReason::NotVisible);
        }
        if self.feed.is_exhausted().await {
            return TriggerOutcome::Ignored(IgnoreReason::Exhausted);
        }
        if self.feed.is_loading().await {
            return TriggerOutcome::Ignored(IgnoreReason::InFlight);
        }
        if self
            .fetching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return TriggerOutcome::Ignored(IgnoreReason::InFlight);
        }

        let outcome = self.feed.fetch_next_page().await;
        self.fetching.store(false, Ordering::SeqCst);
        TriggerOutcome::Fetched(outcome)
    }

    /// Release the observer and detach the feed. A fetch already in flight
    /// runs to completion but its result is dropped.
    pub async fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.live.store(0, Ordering::SeqCst);
        self.feed.detach().await;
    }

    /// Drive the trigger from a stream of visibility events until the
    /// sender side closes or the trigger is torn down.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<VisibilityEvent>) {
        while let Some(event) = events.recv().await {
            if self.torn_down.load(Ordering::SeqCst) {
                break;
            }
            if let TriggerOutcome::Fetched(outcome) =
                self.on_visibility(event.sentinel, event.visible).await
            {
                tracing::debug!("Scroll fetch finished: {:?}", outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Item;
    use crate::error::AppResult;
    use crate::feed::domain::{Cursor, Page, SkipReason};
    use crate::feed::paginator::PageSource;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Serves pages of a fixed size; the last page is short.
    struct SizedSource {
        sizes: Vec<usize>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl SizedSource {
        fn new(sizes: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                sizes,
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated(sizes: Vec<usize>, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                sizes,
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for SizedSource {
        async fn fetch_page(&self, cursor: &Cursor, _page_size: usize) -> AppResult<Page> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let size = self.sizes.get(call).copied().unwrap_or(0);
            let items = (0..size)
                .map(|i| Item::new(format!("{}-{}", call, i), "s", "f"))
                .collect();
            Ok(Page {
                items,
                next_cursor: Cursor::Page(cursor.page_number() + 1),
            })
        }
    }

    fn trigger(source: Arc<SizedSource>, page_size: usize) -> Arc<ScrollTrigger> {
        let feed = Arc::new(FeedPaginator::new(source, page_size));
        Arc::new(ScrollTrigger::new(feed))
    }

    #[tokio::test]
    async fn fourth_trigger_after_short_page_makes_no_request() {
        let source = SizedSource::new(vec![10, 10, 4]);
        let trigger = trigger(source.clone(), 10);

        for _ in 0..3 {
            let sentinel = trigger.arm();
            assert!(matches!(
                trigger.on_visibility(sentinel, true).await,
                TriggerOutcome::Fetched(FetchOutcome::Fetched { .. })
            ));
        }
        assert!(trigger.feed().is_exhausted().await);

        let sentinel = trigger.arm();
        assert!(matches!(
            trigger.on_visibility(sentinel, true).await,
            TriggerOutcome::Ignored(IgnoreReason::Exhausted)
        ));
        assert_eq!(source.calls(), 3);
        assert_eq!(trigger.feed().len().await, 24);
    }

    #[tokio::test]
    async fn rearming_releases_the_old_sentinel() {
        let source = SizedSource::new(vec![10, 10]);
        let trigger = trigger(source.clone(), 10);

        let old = trigger.arm();
        let new = trigger.arm();
        assert_ne!(old, new);
        assert_eq!(trigger.live_sentinel(), Some(new));

        assert!(matches!(
            trigger.on_visibility(old, true).await,
            TriggerOutcome::Ignored(IgnoreReason::StaleSentinel)
        ));
        assert!(matches!(
            trigger.on_visibility(new, false).await,
            TriggerOutcome::Ignored(IgnoreReason::NotVisible)
        ));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn visibility_while_loading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let source = SizedSource::gated(vec![10, 10], gate.clone());
        let trigger = trigger(source.clone(), 10);
        let sentinel = trigger.arm();

        let first = {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.on_visibility(sentinel, true).await })
        };

        // Wait until the first request is actually in flight
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(trigger.state(), TriggerState::Fetching);
        assert!(matches!(
            trigger.on_visibility(sentinel, true).await,
            TriggerOutcome::Ignored(IgnoreReason::InFlight)
        ));
        assert!(matches!(
            trigger.feed().fetch_next_page().await,
            FetchOutcome::Skipped(SkipReason::Loading)
        ));

        gate.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Fetched(_)));
        assert_eq!(trigger.state(), TriggerState::Idle);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn teardown_drops_late_results() {
        let gate = Arc::new(Notify::new());
        let source = SizedSource::gated(vec![10], gate.clone());
        let trigger = trigger(source.clone(), 10);
        let sentinel = trigger.arm();

        let pending = {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.on_visibility(sentinel, true).await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }

        trigger.teardown().await;
        assert_eq!(trigger.live_sentinel(), None);
        gate.notify_one();

        assert!(matches!(
            pending.await.unwrap(),
            TriggerOutcome::Fetched(FetchOutcome::Discarded)
        ));
        assert_eq!(trigger.feed().len().await, 0);
        assert!(matches!(
            trigger.on_visibility(sentinel, true).await,
            TriggerOutcome::Ignored(IgnoreReason::TornDown)
        ));
    }

    #[tokio::test]
    async fn run_loop_consumes_events_until_closed() {
        let source = SizedSource::new(vec![10, 3]);
        let trigger = trigger(source.clone(), 10);
        let (tx, rx) = mpsc::channel(8);
        let driver = tokio::spawn(trigger.clone().run(rx));

        let sentinel = trigger.arm();
        tx.send(VisibilityEvent {
            sentinel,
            visible: true,
        })
        .await
        .unwrap();
        tx.send(VisibilityEvent {
            sentinel,
            visible: true,
        })
        .await
        .unwrap();
        tx.send(VisibilityEvent {
            sentinel,
            visible: true,
        })
        .await
        .unwrap();
        drop(tx);
        driver.await.unwrap();

        assert_eq!(source.calls(), 2);
        assert!(trigger.feed().is_exhausted().await);
    }
}
