//! List command for refrain.
//!
//! Lists every context item with its schedule.

use serde::{Deserialize, Serialize};

use crate::core::ContextItem;
use crate::service::ContextService;

/// Options for the list command.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the list command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOutput {
    pub success: bool,
    pub count: usize,
    /// Counter value the schedule is relative to.
    pub token_count: u64,
    pub items: Vec<ItemInfo>,
}

/// Item summary for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    pub category: String,
    pub priority: u8,
    pub repeat_after_tokens: u64,
    pub last_shown_at_token: u64,
    /// Shown on every query regardless of interval.
    pub forced: bool,
    /// Tokens until interval-due; absent when already due.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_until_due: Option<u64>,
    /// Creation date.
    pub created: String,
}

impl ItemInfo {
    fn from_item(item: &ContextItem, now: u64) -> Self {
        Self {
            id: item.id().to_string(),
            category: item.category().to_string(),
            priority: item.priority(),
            repeat_after_tokens: item.repeat_after_tokens(),
            last_shown_at_token: item.last_shown_at_token(),
            forced: item.is_priority_forced(),
            tokens_until_due: item.tokens_until_due(now),
            created: item.created_at().format("%Y-%m-%d").to_string(),
        }
    }
}

/// The list command implementation.
pub struct ListCommand<'a> {
    service: &'a ContextService,
}

impl<'a> ListCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the list command. Items are sorted by priority, highest first.
    pub fn run(&self) -> ListOutput {
        let now = self.service.summary().token_count;
        let mut items: Vec<ItemInfo> = self
            .service
            .items()
            .iter()
            .map(|item| ItemInfo::from_item(item, now))
            .collect();
        items.sort_by(|a, b| b.priority.cmp(&a.priority));

        ListOutput {
            success: true,
            count: items.len(),
            token_count: now,
            items,
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ListOutput, options: &ListOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if output.items.is_empty() {
            return "No context items.\n".to_string();
        }

        let mut lines = vec![format!(
            "Found {} item(s) at token {}:\n",
            output.count, output.token_count
        )];
        for item in &output.items {
            let schedule = match (item.forced, item.tokens_until_due) {
                (true, _) => "always shown".to_string(),
                (false, Some(n)) => format!("due in {} tokens", n),
                (false, None) => "due now".to_string(),
            };
            lines.push(format!(
                "[{}] {} ({}): {}",
                item.priority, item.id, item.category, schedule
            ));
            lines.push(format!(
                "    every {} tokens, last shown at {} | created {}",
                item.repeat_after_tokens, item.last_shown_at_token, item.created
            ));
        }

        lines.join("\n") + "\n"
    }
}
