//! Context item store.
//!
//! Owns every [`ContextItem`] keyed by id. Items keep the position of their
//! first insertion, so iteration is deterministic for a fixed history of
//! operations; replacing an item keeps its slot.

use std::collections::HashMap;

use crate::core::item::ContextItem;

/// Keyed collection of context items. No scheduling logic lives here.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    items: Vec<ContextItem>,
    index: HashMap<String, usize>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, or replace the item with the same id.
    ///
    /// A replacement is a redefinition: the new item's watermark is reset to 0
    /// so it counts as never shown, whatever the previous instance had
    /// recorded. Returns true if an existing item was replaced.
    pub fn put(&mut self, mut item: ContextItem) -> bool {
        item.reset_watermark();
        self.insert(item)
    }

    /// Insert or replace an item keeping its watermark as-is.
    ///
    /// Only for reloading persisted state, where the item is the same
    /// definition rather than a new one.
    pub(crate) fn restore(&mut self, item: ContextItem) -> bool {
        self.insert(item)
    }

    fn insert(&mut self, item: ContextItem) -> bool {
        match self.index.get(item.id()) {
            Some(&pos) => {
                self.items[pos] = item;
                true
            }
            None => {
                self.index.insert(item.id().to_string(), self.items.len());
                self.items.push(item);
                false
            }
        }
    }

    /// Remove an item by id. Returns false if no such item existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.index.remove(id) else {
            return false;
        };
        self.items.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&ContextItem> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ContextItem> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.items[pos]),
            None => None,
        }
    }

    /// Check whether an item with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All items. Callers must not depend on the order.
    pub fn all(&self) -> &[ContextItem] {
        &self.items
    }

    pub(crate) fn all_mut(&mut self) -> &mut [ContextItem] {
        &mut self.items
    }

    /// Number of items in the store.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
