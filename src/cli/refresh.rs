//! Refresh command for refrain.
//!
//! Replaces the git status item with a fresh snapshot.

use serde::{Deserialize, Serialize};

use crate::service::{ContextService, RefreshOutcome};

/// Options for the refresh command.
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the refresh command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutput {
    /// False only when git could not be read.
    pub success: bool,
    /// Whether the git status item was replaced.
    pub updated: bool,
    pub message: String,
}

/// The refresh command implementation.
pub struct RefreshCommand<'a> {
    service: &'a ContextService,
}

impl<'a> RefreshCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the refresh command.
    pub fn run(&self) -> RefreshOutput {
        let outcome = self.service.force_refresh();
        RefreshOutput {
            success: !matches!(outcome, RefreshOutcome::Failed(_)),
            updated: outcome.is_updated(),
            message: outcome.message(),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &RefreshOutput, options: &RefreshOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }
        format!("{}\n", output.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::test_service;
    use crate::config::Config;
    use crate::git::tests::FakeGit;
    use crate::git::GitStatusProvider;
    use crate::tokens::HeuristicCounter;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_refresh_updates() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let output = RefreshCommand::new(&service).run();
        assert!(output.success);
        assert!(output.updated);
        assert_eq!(output.message, "Refreshed git status and contexts");
    }

    #[test]
    fn test_refresh_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let service = ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            Some(Arc::new(FakeGit::failing()) as Arc<dyn GitStatusProvider>),
            None,
        );
        let output = RefreshCommand::new(&service).run();
        assert!(!output.success);
        assert!(!output.updated);
        assert!(output.message.starts_with("No update performed"));
    }
}
