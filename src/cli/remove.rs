//! Remove command for refrain.

use serde::{Deserialize, Serialize};

use crate::service::ContextService;

/// Options for the remove command.
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the remove command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveOutput {
    /// Whether an item was removed.
    pub success: bool,
    pub message: String,
}

/// The remove command implementation.
pub struct RemoveCommand<'a> {
    service: &'a ContextService,
}

impl<'a> RemoveCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the remove command.
    pub fn run(&self, id: &str) -> RemoveOutput {
        let existed = self.service.get_item(id).is_some();
        let message = self.service.remove_item(id);
        RemoveOutput {
            success: existed,
            message,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &RemoveOutput, options: &RemoveOptions) -> String {
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
    use crate::service::AddItemRequest;
    use tempfile::TempDir;

    #[test]
    fn test_remove_existing_and_missing() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        service
            .add_item(AddItemRequest::new("style", "Use rustfmt"))
            .unwrap();
        let cmd = RemoveCommand::new(&service);

        let output = cmd.run("guideline_style");
        assert!(output.success);
        assert_eq!(
            cmd.format_output(&output, &RemoveOptions::default()),
            "Removed context: guideline_style\n"
        );

        let output = cmd.run("guideline_style");
        assert!(!output.success);
        assert_eq!(output.message, "Failed to remove context: guideline_style");
    }
}
