//! Track command for refrain.
//!
//! Records consumption of a piece of text.

use serde::{Deserialize, Serialize};

use crate::service::ContextService;

/// Options for the track command.
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the track command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackOutput {
    pub success: bool,
    /// Tokens in the tracked text.
    pub tokens: u64,
    /// Counter value after tracking.
    pub total: u64,
    /// Tokenizer used.
    pub counter: String,
}

/// The track command implementation.
pub struct TrackCommand<'a> {
    service: &'a ContextService,
}

impl<'a> TrackCommand<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run the track command.
    pub fn run(&self, text: &str) -> TrackOutput {
        let tokens = self.service.track_tokens(text);
        TrackOutput {
            success: true,
            tokens,
            total: self.service.summary().token_count,
            counter: self.service.counter_name().to_string(),
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &TrackOutput, options: &TrackOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }
        format!("Tracked {} tokens (total: {})\n", output.tokens, output.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::test_service;
    use tempfile::TempDir;

    #[test]
    fn test_track_accumulates() {
        let dir = TempDir::new().unwrap();
        let service = test_service(&dir);
        let cmd = TrackCommand::new(&service);

        cmd.run("abcd");
        let output = cmd.run("abcdefgh");
        assert_eq!(output.tokens, 2);
        assert_eq!(output.total, 3);
        assert_eq!(output.counter, "heuristic");
        assert_eq!(
            cmd.format_output(&output, &TrackOptions::default()),
            "Tracked 2 tokens (total: 3)\n"
        );
    }
}
