//! Core types and logic for refrain.
//!
//! This module contains the context item entity, the keyed store that owns
//! items, and the token-driven repetition scheduler built on top of it.

pub mod item;
pub mod scheduler;
pub mod shared;
pub mod store;

pub use item::{
    Category, ContextItem, MAX_PRIORITY, MIN_PRIORITY, MIN_REPEAT_AFTER_TOKENS,
    PRIORITY_FORCE_THRESHOLD,
};
pub use scheduler::{
    ForecastEntry, RepetitionScheduler, SchedulerSnapshot, Summary, SNAPSHOT_SCHEMA_VERSION,
};
pub use shared::SharedScheduler;
pub use store::ContextStore;
