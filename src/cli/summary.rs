//! Summary command for refrain.
//!
//! Shows item counts, the token counter, and upcoming repetitions.

use crate::core::Summary;
use crate::service::ContextService;

/// Options for the summary command.
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// The summary command implementation.
pub struct SummaryCommand<'a> {
    service: &'a ContextService,
}

impl<'a> SummaryCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the summary command.
    pub fn run(&self) -> Summary {
        self.service.summary()
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &Summary, options: &SummaryOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        let mut lines = vec![
            format!("Items:  {}", output.total_items),
            format!("Tokens: {}", output.token_count),
        ];

        if !output.by_category.is_empty() {
            lines.push(String::new());
            lines.push("By category:".to_string());
            for (category, count) in &output.by_category {
                lines.push(format!("  {:<14} {}", category.as_str(), count));
            }
        }

        lines.push(String::new());
        if output.forecast.is_empty() {
            lines.push("No upcoming repetitions.".to_string());
        } else {
            lines.push("Upcoming:".to_string());
            for entry in &output.forecast {
                lines.push(format!(
                    "  {} (priority {}) in {} tokens",
                    entry.id, entry.priority, entry.tokens_until_due
                ));
            }
        }

        lines.join("\n") + "\n"
    }
}
