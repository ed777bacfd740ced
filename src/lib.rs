//! refrain - token-aware context repetition for Claude Code
//!
//! refrain keeps a set of labeled context items (project guidelines, git
//! state, documentation), counts the tokens a session consumes, and decides
//! which items are due to be shown to the model again. High-priority items
//! are shown on every query; the rest come back once their token interval
//! has elapsed.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod git;
pub mod guidelines;
pub mod hooks;
pub mod server;
pub mod service;
pub mod storage;
pub mod tokens;
pub mod util;

pub use config::Config;
pub use core::{
    Category, ContextItem, ContextStore, ForecastEntry, RepetitionScheduler, SchedulerSnapshot,
    SharedScheduler, Summary,
};
pub use error::{RefrainError, Result};
pub use git::{GitCli, GitSnapshot, GitStatusProvider};
pub use guidelines::GuidelineLibrary;
pub use service::{AddItemRequest, ContextService, RefreshOutcome};
pub use storage::{FileStateStore, MemoryStateStore, StateStore};
pub use tokens::{HeuristicCounter, TiktokenCounter, TokenCounter};

// CLI commands
pub use cli::{
    ActiveCommand, AddCommand, InitCommand, ListCommand, RefreshCommand, RemoveCommand,
    ServeCommand, SummaryCommand, TrackCommand,
};
