//! Hook input types for Claude Code integration.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{RefrainError, Result};

/// Fields common to every hook payload.
///
/// All fields are optional so an unexpected payload shape degrades to
/// "use the current directory" instead of failing the hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<PathBuf>,
    /// Working directory of the Claude Code session.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
}

impl HookInput {
    pub fn new(session_id: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }
}

/// Input for the user-prompt-submit hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPromptSubmitInput {
    #[serde(flatten)]
    pub common: HookInput,
    /// The prompt the user submitted.
    #[serde(default)]
    pub prompt: String,
}

/// Input for the post-tool-use hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostToolUseInput {
    #[serde(flatten)]
    pub common: HookInput,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    /// Tool output. Usually an object; sometimes a plain string.
    #[serde(default)]
    pub tool_response: serde_json::Value,
}

impl PostToolUseInput {
    /// Text of the tool response as the model sees it.
    ///
    /// Strings are used verbatim; anything else is counted as compact JSON.
    pub fn response_text(&self) -> String {
        match &self.tool_response {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Parse hook input JSON.
pub fn parse_input<T: DeserializeOwned>(input: &str) -> Result<T> {
    serde_json::from_str(input)
        .map_err(|e| RefrainError::serde(format!("Failed to parse hook input: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_common_fields() {
        let json = r#"{
            "session_id": "abc123",
            "transcript_path": "/tmp/transcript.jsonl",
            "cwd": "/home/user/project",
            "hook_event_name": "SessionStart",
            "source": "startup"
        }"#;
        let input: HookInput = parse_input(json).unwrap();
        assert_eq!(input.session_id, "abc123");
        assert_eq!(input.cwd, Some(PathBuf::from("/home/user/project")));
        assert_eq!(input.hook_event_name.as_deref(), Some("SessionStart"));
    }

    #[test]
    fn test_parse_empty_object() {
        let input: HookInput = parse_input("{}").unwrap();
        assert_eq!(input, HookInput::default());
    }

    #[test]
    fn test_parse_user_prompt_submit() {
        let json = r#"{"session_id":"s","cwd":"/p","prompt":"Fix the build"}"#;
        let input: UserPromptSubmitInput = parse_input(json).unwrap();
        assert_eq!(input.prompt, "Fix the build");
        assert_eq!(input.common.session_id, "s");
    }

    #[test]
    fn test_response_text_string_and_object() {
        let mut input: PostToolUseInput = parse_input(
            r#"{"session_id":"s","tool_name":"Bash","tool_response":"ok\n"}"#,
        )
        .unwrap();
        assert_eq!(input.response_text(), "ok\n");

        input.tool_response = json!({"stdout": "hi", "exit_code": 0});
        let text = input.response_text();
        assert!(text.contains("\"stdout\":\"hi\""));

        input.tool_response = serde_json::Value::Null;
        assert_eq!(input.response_text(), "");
    }

    #[test]
    fn test_parse_invalid_json() {
        let result: Result<HookInput> = parse_input("not json");
        assert!(matches!(result, Err(RefrainError::Serde { .. })));
    }
}
