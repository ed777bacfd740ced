//! CLI commands for refrain.
//!
//! - **Item commands**: add, remove, track (change the scheduler)
//! - **View commands**: summary, active, list, refresh
//! - **Setup**: init
//! - **Long-running**: serve (NDJSON loop); hooks live in [`crate::hooks`]

// Item commands
pub mod add;
pub mod remove;
pub mod track;

// View commands
pub mod active;
pub mod list;
pub mod refresh;
pub mod summary;

// Setup and long-running
pub mod init;
pub mod serve;

pub use active::ActiveCommand;
pub use add::AddCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use refresh::RefreshCommand;
pub use remove::RemoveCommand;
pub use serve::ServeCommand;
pub use summary::SummaryCommand;
pub use track::TrackCommand;

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::config::Config;
    use crate::git::tests::FakeGit;
    use crate::git::GitStatusProvider;
    use crate::service::ContextService;
    use crate::storage::{MemoryStateStore, StateStore};
    use crate::tokens::HeuristicCounter;

    /// Service over a temp project with deterministic collaborators.
    pub fn test_service(dir: &TempDir) -> ContextService {
        ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            Some(Arc::new(FakeGit::on_branch("main")) as Arc<dyn GitStatusProvider>),
            Some(Arc::new(MemoryStateStore::new()) as Arc<dyn StateStore>),
        )
    }
}
