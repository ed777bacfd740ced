//! Hook dispatch and handlers.

use std::env;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::config::{find_project_root, Config};
use crate::error::{RefrainError, Result};
use crate::hooks::input::{parse_input, HookInput, PostToolUseInput, UserPromptSubmitInput};
use crate::hooks::output::{to_json, HookOutput};
use crate::service::{render_items, ContextService, RefreshOutcome};

/// Hook events refrain handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    SessionStart,
    UserPromptSubmit,
    PostToolUse,
}

impl HookType {
    /// Parse hook type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "session-start" | "sessionstart" | "session_start" => Some(Self::SessionStart),
            "user-prompt-submit" | "userpromptsubmit" | "user_prompt_submit" => {
                Some(Self::UserPromptSubmit)
            }
            "post-tool-use" | "posttooluse" | "post_tool_use" => Some(Self::PostToolUse),
            _ => None,
        }
    }

    /// Event name as Claude Code spells it.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PostToolUse => "PostToolUse",
        }
    }
}

/// Runs hook handlers against one service.
pub struct HookRunner<'a> {
    service: &'a ContextService,
}

impl<'a> HookRunner<'a> {
    pub fn new(service: &'a ContextService) -> Self {
        Self { service }
    }

    /// Run a hook with provided input.
    pub fn run_with_input(&self, hook_type: HookType, input: &str) -> Result<HookOutput> {
        match hook_type {
            HookType::SessionStart => self.handle_session_start(input),
            HookType::UserPromptSubmit => self.handle_user_prompt_submit(input),
            HookType::PostToolUse => self.handle_post_tool_use(input),
        }
    }

    fn inject_due(&self, hook_type: HookType) -> HookOutput {
        let due = self.service.due_items();
        if due.is_empty() {
            HookOutput::empty()
        } else {
            tracing::info!(count = due.len(), event = hook_type.event_name(), "injecting context");
            HookOutput::with_context(hook_type.event_name(), render_items(&due))
        }
    }

    fn handle_session_start(&self, input: &str) -> Result<HookOutput> {
        let _input: HookInput = parse_input(input)?;

        self.service.sync_guidelines();
        match self.service.force_refresh() {
            RefreshOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "git status unavailable at session start")
            }
            outcome => tracing::debug!(outcome = %outcome.message(), "session start refresh"),
        }

        Ok(self.inject_due(HookType::SessionStart))
    }

    fn handle_user_prompt_submit(&self, input: &str) -> Result<HookOutput> {
        let input: UserPromptSubmitInput = parse_input(input)?;
        self.service.track_tokens(&input.prompt);
        Ok(self.inject_due(HookType::UserPromptSubmit))
    }

    fn handle_post_tool_use(&self, input: &str) -> Result<HookOutput> {
        let input: PostToolUseInput = parse_input(input)?;
        let tokens = self.service.track_tokens(&input.response_text());
        tracing::debug!(tool = %input.tool_name, tokens, "tool response counted");
        Ok(HookOutput::empty())
    }
}

/// Read all of stdin.
pub fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| RefrainError::storage("stdin", e))?;
    Ok(input)
}

/// Project root for a hook payload: the payload's `cwd` if present, else
/// the process working directory.
fn hook_project_root(input: &str) -> PathBuf {
    let cwd = parse_input::<HookInput>(input)
        .ok()
        .and_then(|i| i.cwd)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    find_project_root(&cwd)
}

/// Run a hook end to end and return the JSON to print.
///
/// Never fails: any error is logged and yields `{}`.
pub fn run_hook(hook_type: HookType, input: &str) -> String {
    let root = hook_project_root(input);
    let config = Config::load_from_cwd(&root);
    let service = ContextService::open(&root, config);

    let output = HookRunner::new(&service)
        .run_with_input(hook_type, input)
        .unwrap_or_else(|e| {
            tracing::warn!(event = hook_type.event_name(), error = %e, "hook failed, continuing");
            HookOutput::empty()
        });

    to_json(&output).unwrap_or_else(|_| "{}".to_string())
}
