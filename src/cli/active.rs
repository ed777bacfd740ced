//! Active command for refrain.
//!
//! Prints the items due now and marks them shown.

use serde::{Deserialize, Serialize};

use crate::service::{render_items, ContextService};

/// Options for the active command.
#[derive(Debug, Clone, Default)]
pub struct ActiveOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the active command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveOutput {
    pub success: bool,
    /// Ids of the due items, in presentation order.
    pub ids: Vec<String>,
    /// Rendered markdown.
    pub text: String,
}

/// The active command implementation.
pub struct ActiveCommand<'a> {
    service: &'a ContextService,
}

impl<'a> ActiveCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the active command.
    pub fn run(&self) -> ActiveOutput {
        let due = self.service.due_items();
        ActiveOutput {
            success: true,
            ids: due.iter().map(|item| item.id().to_string()).collect(),
            text: render_items(&due),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ActiveOutput, options: &ActiveOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }
        format!("{}\n", output.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::test_service;
    use crate::service::{AddItemRequest, NO_ACTIVE_CONTEXTS};
    use tempfile::TempDir;

    #[test]
    fn test_active_empty() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let cmd = ActiveCommand::new(&service);

        let output = cmd.run();
        assert!(output.ids.is_empty());
        assert_eq!(
            cmd.format_output(&output, &ActiveOptions::default()),
            format!("{}\n", NO_ACTIVE_CONTEXTS)
        );
    }

    #[test]
    fn test_active_forced_item() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        service
            .add_item(AddItemRequest {
                priority: Some(10),
                ..AddItemRequest::new("critical_rules", "No force push")
            })
            .unwrap();

        let output = ActiveCommand::new(&service).run();
        assert_eq!(output.ids, vec!["guideline_critical_rules"]);
        assert!(output
            .text
            .starts_with("# guideline_critical_rules (Priority: 10)"));
    }
}
