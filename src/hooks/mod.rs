//! Hook integration for Claude Code.
//!
//! Claude Code runs `refrain hook <event>` at points in the session
//! lifecycle, passing JSON on stdin:
//!
//! - **session-start**: sync guidelines, refresh git status, inject due items
//! - **user-prompt-submit**: count the prompt, inject due items
//! - **post-tool-use**: count the tool response
//!
//! Hooks never fail the session: errors are logged and an empty output is
//! returned.

pub mod input;
pub mod output;
pub mod runner;

pub use input::{parse_input, HookInput, PostToolUseInput, UserPromptSubmitInput};
pub use output::{to_json, HookOutput, HookSpecificOutput};
pub use runner::{run_hook, HookRunner, HookType};
