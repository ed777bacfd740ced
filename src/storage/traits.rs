//! State storage traits for refrain.

use std::sync::Arc;

use crate::core::SchedulerSnapshot;
use crate::error::Result;

/// Trait for scheduler state backends.
pub trait StateStore: Send + Sync {
    /// Load the saved snapshot.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> Result<Option<SchedulerSnapshot>>;

    /// Save a snapshot, replacing any previous one.
    fn save(&self, snapshot: &SchedulerSnapshot) -> Result<()>;

    /// Delete the saved snapshot.
    ///
    /// Returns `Ok(())` even if nothing was saved.
    fn clear(&self) -> Result<()>;

    /// Run `critical` while holding the backend's exclusive lock.
    ///
    /// A load, modify, save sequence inside `critical` is not interleaved
    /// with another holder of the lock, including other processes sharing
    /// the same backing file. Backends private to one process just run it.
    fn locked(&self, critical: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        critical()
    }
}

/// Lets `Arc<T>` stand in for `T`, so tests can keep a handle on the store
/// they hand to a service.
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn load(&self) -> Result<Option<SchedulerSnapshot>> {
        (**self).load()
    }

    fn save(&self, snapshot: &SchedulerSnapshot) -> Result<()> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn locked(&self, critical: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        (**self).locked(critical)
    }
}
