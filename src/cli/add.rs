//! Add command for refrain.
//!
//! Adds or replaces a context item.

use serde::{Deserialize, Serialize};

use crate::core::Category;
use crate::service::{AddItemRequest, ContextService};

/// Options for the add command.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Item priority (1-10).
    pub priority: Option<i64>,
    /// Item category.
    pub category: Option<Category>,
    /// Tokens between repetitions.
    pub repeat_after_tokens: Option<i64>,
}

/// Output format for the add command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOutput {
    /// Whether the item was added.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// The add command implementation.
pub struct AddCommand<'a> {
    service: &'a ContextService,
}

impl<'a> AddCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the add command.
    pub fn run(&self, id: &str, content: &str, options: &AddOptions) -> AddOutput {
        let request = AddItemRequest {
            id: id.to_string(),
            content: content.to_string(),
            priority: options.priority,
            category: options.category,
            repeat_after_tokens: options.repeat_after_tokens,
        };
        match self.service.add_item(request) {
            Ok(message) => AddOutput::success(message),
            Err(e) => AddOutput::failure(e.to_string()),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &AddOutput, options: &AddOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }
        match (&output.message, &output.error) {
            (Some(message), _) if output.success => format!("{}\n", message),
            (_, error) => format!("Add failed: {}\n", error.as_deref().unwrap_or("unknown error")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::test_service;
    use tempfile::TempDir;

    #[test]
    fn test_add_success() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let cmd = AddCommand::new(&service);
        let options = AddOptions {
            category: Some(Category::State),
            priority: Some(7),
            ..Default::default()
        };

        let output = cmd.run("build", "cargo build --release", &options);
        assert!(output.success);
        assert_eq!(cmd.format_output(&output, &options), "Added context: build\n");
        assert_eq!(service.get_item("build").unwrap().priority(), 7);
    }

    #[test]
    fn test_add_invalid_priority() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let cmd = AddCommand::new(&service);
        let options = AddOptions {
            priority: Some(42),
            ..Default::default()
        };

        let output = cmd.run("x", "y", &options);
        assert!(!output.success);
        assert!(cmd
            .format_output(&output, &options)
            .starts_with("Add failed: invalid context item"));
    }

    #[test]
    fn test_add_json_and_quiet() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let cmd = AddCommand::new(&service);
        let output = cmd.run("a", "b", &AddOptions::default());

        let json = cmd.format_output(
            &output,
            &AddOptions {
                json: true,
                ..Default::default()
            },
        );
        assert!(json.contains("\"success\": true"));
        assert!(json.contains("Added context: guideline_a"));

        let quiet = AddOptions {
            quiet: true,
            ..Default::default()
        };
        assert!(cmd.format_output(&output, &quiet).is_empty());
    }
}
