//! In-memory state storage for testing.

use std::sync::{PoisonError, RwLock};

use crate::core::SchedulerSnapshot;
use crate::error::Result;
use crate::storage::StateStore;

/// In-memory state store. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: RwLock<Option<SchedulerSnapshot>>,
    saves: RwLock<usize>,
}

impl MemoryStateStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<SchedulerSnapshot>> {
        Ok(self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &SchedulerSnapshot) -> Result<()> {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        *self.saves.write().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_state_store_roundtrip;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        test_state_store_roundtrip(&store);
    }

    #[test]
    fn test_save_count() {
        let store = MemoryStateStore::new();
        assert_eq!(store.save_count(), 0);
        store.save(&SchedulerSnapshot::default()).unwrap();
        store.save(&SchedulerSnapshot::default()).unwrap();
        assert_eq!(store.save_count(), 2);
    }
}
