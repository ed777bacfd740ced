//! Hook output types for Claude Code integration.

use serde::{Deserialize, Serialize};

use crate::error::{RefrainError, Result};

/// Event-specific part of a hook response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookSpecificOutput {
    /// Event name as Claude Code spells it, e.g. `UserPromptSubmit`.
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    /// Text added to the model's context.
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}

/// JSON written to stdout by every hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    /// No context injection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Inject `context` for the given event.
    pub fn with_context(event: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: event.into(),
                additional_context: context.into(),
            }),
        }
    }

    /// The injected context, if any.
    pub fn additional_context(&self) -> Option<&str> {
        self.hook_specific_output
            .as_ref()
            .map(|o| o.additional_context.as_str())
    }
}

/// Serialize output to JSON.
pub fn to_json<T: Serialize>(output: &T) -> Result<String> {
    serde_json::to_string(output)
        .map_err(|e| RefrainError::serde(format!("Failed to serialize output: {}", e)))
}
