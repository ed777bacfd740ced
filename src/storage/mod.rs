//! Scheduler state persistence for refrain.
//!
//! One-shot commands and hooks run in short-lived processes, so the token
//! counter and item watermarks are saved between invocations. File-based and
//! in-memory backends are provided.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use traits::StateStore;
