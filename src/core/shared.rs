//! Thread-safe handle to a single scheduler.
//!
//! The store and the token counter sit behind one `RwLock`, so
//! `compute_due` reads `now` and moves watermarks without a concurrent
//! `record_consumption` slipping in between. Mutating operations take the
//! write lock; forecast and summary share the read lock.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::item::ContextItem;
use crate::core::scheduler::{ForecastEntry, RepetitionScheduler, SchedulerSnapshot, Summary};
use crate::tokens::TokenCounter;

/// Cloneable handle; all clones share one scheduler.
#[derive(Debug, Clone, Default)]
pub struct SharedScheduler {
    inner: Arc<RwLock<RepetitionScheduler>>,
}

impl SharedScheduler {
    /// Wrap a scheduler.
    pub fn new(scheduler: RepetitionScheduler) -> Self {
        Self {
            inner: Arc::new(RwLock::new(scheduler)),
        }
    }

    // A panic while holding the lock leaves the scheduler in a consistent
    // state (every mutation is a single field store), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, RepetitionScheduler> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RepetitionScheduler> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a whole scheduler, e.g. one reloaded from saved state.
    pub fn replace(&self, scheduler: RepetitionScheduler) {
        *self.write() = scheduler;
    }

    pub fn put(&self, item: ContextItem) -> bool {
        self.write().put(item)
    }

    pub fn put_if_changed(&self, item: ContextItem) -> bool {
        self.write().put_if_changed(item)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<ContextItem> {
        self.read().get(id).cloned()
    }

    /// Snapshot of every item in store order.
    pub fn items(&self) -> Vec<ContextItem> {
        self.read().store().all().to_vec()
    }

    pub fn token_count(&self) -> u64 {
        self.read().token_count()
    }

    pub fn record_tokens(&self, tokens: u64) -> u64 {
        let total = self.write().record_tokens(tokens);
        tracing::debug!(tokens, total, "recorded consumption");
        total
    }

    /// Count `text` outside the lock, then record the count.
    pub fn record_text(&self, text: &str, counter: &dyn TokenCounter) -> u64 {
        let tokens = counter.count(text);
        self.record_tokens(tokens);
        tokens
    }

    pub fn compute_due(&self) -> Vec<ContextItem> {
        self.write().compute_due()
    }

    pub fn forecast(&self) -> Vec<ForecastEntry> {
        self.read().forecast()
    }

    pub fn summary(&self) -> Summary {
        self.read().summary()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.read().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Category;
    use std::thread;

    #[test]
    fn test_clones_share_state() {
        let shared = SharedScheduler::default();
        let other = shared.clone();
        shared.put(ContextItem::new("a", "alpha", 5, Category::Guideline, 10).unwrap());
        other.record_tokens(20);

        assert_eq!(shared.token_count(), 20);
        assert_eq!(other.get("a").unwrap().content(), "alpha");
        assert_eq!(other.items().len(), 1);
    }

    #[test]
    fn test_concurrent_consumption_loses_nothing() {
        let shared = SharedScheduler::default();
        let mut handles = vec![];

        for _ in 0..8 {
            let handle_shared = shared.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    handle_shared.record_tokens(3);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.token_count(), 8 * 1_000 * 3);
    }

    #[test]
    fn test_concurrent_due_queries_show_each_item_once_per_interval() {
        let shared = SharedScheduler::default();
        shared.put(ContextItem::new("a", "alpha", 3, Category::Guideline, 100).unwrap());
        shared.record_tokens(100);

        let mut handles = vec![];
        for _ in 0..4 {
            let handle_shared = shared.clone();
            handles.push(thread::spawn(move || handle_shared.compute_due().len()));
        }

        let shown: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(shown, 1);
        assert_eq!(shared.get("a").unwrap().last_shown_at_token(), 100);
    }

    #[test]
    fn test_record_text() {
        let shared = SharedScheduler::default();
        let added = shared.record_text("abcdefgh", &crate::tokens::HeuristicCounter);
        assert_eq!(added, 2);
        assert_eq!(shared.token_count(), 2);
    }

    #[test]
    fn test_replace_swaps_everything() {
        let shared = SharedScheduler::default();
        shared.put(ContextItem::new("a", "alpha", 5, Category::Guideline, 10).unwrap());

        let mut reloaded = RepetitionScheduler::new();
        reloaded.record_tokens(40);
        shared.replace(reloaded);

        assert_eq!(shared.token_count(), 40);
        assert!(shared.get("a").is_none());
    }
}
