//! Token-driven repetition scheduler.
//!
//! The scheduler owns the [`ContextStore`] together with a monotonic counter
//! of consumed tokens. Every query is answered from those two pieces of state:
//!
//! - an item is **interval-due** once `now - last_shown_at_token` reaches its
//!   `repeat_after_tokens`
//! - an item is **priority-forced** when its priority is at least
//!   [`PRIORITY_FORCE_THRESHOLD`]
//!
//! [`RepetitionScheduler::compute_due`] returns the union of both sets ordered
//! by priority. Showing an interval-due item moves its watermark to `now`;
//! forced items are exempt from the interval mechanism, so showing them only
//! because they are forced leaves the watermark alone.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::item::{Category, ContextItem, PRIORITY_FORCE_THRESHOLD};
use crate::core::store::ContextStore;
use crate::error::{RefrainError, Result};
use crate::tokens::TokenCounter;

/// Schema version for persisted scheduler snapshots.
pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// One upcoming repetition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Item id.
    pub id: String,
    /// Tokens that must still be consumed before the item is due.
    pub tokens_until_due: u64,
    /// Item priority.
    pub priority: u8,
}

/// Read-only aggregate view of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of items in the store.
    pub total_items: usize,
    /// Current value of the token counter.
    pub token_count: u64,
    /// Item count per category. Categories with no items are omitted.
    pub by_category: BTreeMap<Category, usize>,
    /// Upcoming repetitions, soonest first.
    pub forecast: Vec<ForecastEntry>,
}

/// Persisted form of the scheduler: counter plus items with watermarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Schema version for forward compatibility.
    pub schema_version: u8,
    /// Token counter at the time of the snapshot.
    pub token_count: u64,
    /// Items in store order.
    pub items: Vec<ContextItem>,
}

impl Default for SchedulerSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            token_count: 0,
            items: Vec::new(),
        }
    }
}

/// Decides which context items are due at the current token count.
#[derive(Debug, Clone, Default)]
pub struct RepetitionScheduler {
    store: ContextStore,
    token_count: u64,
}

impl RepetitionScheduler {
    /// Create a scheduler with an empty store and the counter at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a scheduler from a snapshot, keeping every watermark.
    ///
    /// Fails if the snapshot has an unknown schema version or contains an
    /// item that does not pass validation.
    pub fn restore(snapshot: SchedulerSnapshot) -> Result<Self> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(RefrainError::serde(format!(
                "unsupported snapshot schema version {} (expected {})",
                snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION
            )));
        }

        let mut store = ContextStore::new();
        for item in snapshot.items {
            item.validate()?;
            store.restore(item);
        }

        Ok(Self {
            store,
            token_count: snapshot.token_count,
        })
    }

    /// Capture the counter and items for persistence.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            token_count: self.token_count,
            items: self.store.all().to_vec(),
        }
    }

    /// Current value of the token counter.
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Insert or redefine an item. See [`ContextStore::put`].
    pub fn put(&mut self, item: ContextItem) -> bool {
        self.store.put(item)
    }

    /// Insert an item read back from its source file.
    ///
    /// An absent id is inserted as given. A stored item is only touched when
    /// the content differs, and then keeps its own priority, category, and
    /// interval (the watermark resets as for any redefinition). Returns true
    /// if the store changed.
    pub fn put_if_changed(&mut self, item: ContextItem) -> bool {
        let replacement = match self.store.get(item.id()) {
            Some(existing) if existing.content() == item.content() => return false,
            Some(existing) => existing.with_content(item.content()),
            None => item,
        };
        self.store.put(replacement);
        true
    }

    /// Remove an item. Returns false if it did not exist.
    pub fn remove(&mut self, id: &str) -> bool {
        self.store.remove(id)
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&ContextItem> {
        self.store.get(id)
    }

    /// Advance the counter by a precomputed token count.
    ///
    /// Only the counter moves. Saturates at `u64::MAX` rather than wrapping.
    /// Returns the new counter value.
    pub fn record_tokens(&mut self, tokens: u64) -> u64 {
        self.token_count = self.token_count.saturating_add(tokens);
        self.token_count
    }

    /// Count the tokens in `text` and advance the counter by that amount.
    ///
    /// Returns the number of tokens recorded.
    pub fn record_text(&mut self, text: &str, counter: &dyn TokenCounter) -> u64 {
        let tokens = counter.count(text);
        self.record_tokens(tokens);
        tokens
    }

    /// Items due at the current counter value. See [`Self::compute_due_at`].
    pub fn compute_due(&mut self) -> Vec<ContextItem> {
        self.compute_due_at(self.token_count)
    }

    /// Items due at counter value `now`, highest priority first.
    ///
    /// Interval-due items have their watermark moved to `now`, consuming their
    /// due state. Items included only because they are priority-forced keep
    /// their watermark. Each id appears at most once; equal priorities keep
    /// store order.
    pub fn compute_due_at(&mut self, now: u64) -> Vec<ContextItem> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut due: Vec<ContextItem> = Vec::new();

        for item in self.store.all_mut() {
            if item.is_interval_due(now) {
                item.mark_shown(now);
                seen.insert(item.id().to_string());
                due.push(item.clone());
            }
        }

        for item in self.store.all() {
            if item.priority() >= PRIORITY_FORCE_THRESHOLD && !seen.contains(item.id()) {
                seen.insert(item.id().to_string());
                due.push(item.clone());
            }
        }

        // Both passes walk the store in order, so restore store order before
        // the stable priority sort to make ties independent of which rule
        // included the item.
        let position: BTreeMap<&str, usize> = self
            .store
            .all()
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id(), pos))
            .collect();
        due.sort_by_key(|item| position.get(item.id()).copied().unwrap_or(usize::MAX));
        due.sort_by(|a, b| b.priority().cmp(&a.priority()));

        tracing::debug!(now, count = due.len(), "computed due items");
        due
    }

    /// Upcoming repetitions at the current counter value, soonest first.
    ///
    /// Items that are already interval-due, or priority-forced, have nothing
    /// upcoming and are left out.
    pub fn forecast(&self) -> Vec<ForecastEntry> {
        let now = self.token_count;
        let mut entries: Vec<ForecastEntry> = self
            .store
            .all()
            .iter()
            .filter(|item| !item.is_priority_forced())
            .filter_map(|item| {
                item.tokens_until_due(now).map(|tokens_until_due| ForecastEntry {
                    id: item.id().to_string(),
                    tokens_until_due,
                    priority: item.priority(),
                })
            })
            .collect();

        entries.sort_by_key(|entry| entry.tokens_until_due);
        entries
    }

    /// Aggregate view: item counts, counter, and forecast. No mutation.
    pub fn summary(&self) -> Summary {
        let mut by_category: BTreeMap<Category, usize> = BTreeMap::new();
        for item in self.store.all() {
            *by_category.entry(item.category()).or_insert(0) += 1;
        }

        Summary {
            total_items: self.store.len(),
            token_count: self.token_count,
            by_category,
            forecast: self.forecast(),
        }
    }
}
