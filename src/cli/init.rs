//! Init command for refrain.
//!
//! Scaffolds the project config, the guidelines directory with two example
//! guidelines, and prints the Claude Code hook configuration to install.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{guidelines_dir, project_config_path, project_refrain_dir, Config};

/// Options for the init command.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Force overwrite existing files.
    pub force: bool,
}

/// Output format for the init command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitOutput {
    /// Whether initialization was successful.
    pub success: bool,
    /// Files and directories created.
    pub created: Vec<String>,
    /// Files that already existed (skipped).
    pub skipped: Vec<String>,
    /// Hook settings to merge into `.claude/settings.json`.
    pub hooks: serde_json::Value,
    /// Error message if initialization failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InitOutput {
    /// Create a successful output.
    pub fn success(created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: true,
            created,
            skipped,
            hooks: hook_settings(),
            error: None,
        }
    }

    /// Create a failed output, reporting what was created before the failure.
    pub fn failure(error: impl Into<String>, created: Vec<String>, skipped: Vec<String>) -> Self {
        Self {
            success: false,
            created,
            skipped,
            hooks: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Default config.toml content.
const DEFAULT_CONFIG: &str = r#"# refrain configuration
#
# Every key is optional; the values below are the defaults.

# Defaults for items added without explicit values
[scheduler]
default_priority = 5
default_repeat_after_tokens = 5000

# Guideline files: every *.md in `dir` becomes a context item.
# File names containing "critical" get critical_priority, "important"
# get important_priority. Priority 8 and above is shown on every query.
[guidelines]
dir = ".claude"
default_priority = 5
critical_priority = 10
important_priority = 8
high_priority_repeat_after_tokens = 3000
repeat_after_tokens = 5000
persist_added = true

# Git status item
[git]
enabled = true
refresh_interval_seconds = 30
recent_commits = 5
status_priority = 6
status_repeat_after_tokens = 2000

# Token counting: "cl100k_base", "o200k_base", or "heuristic"
[tokens]
encoding = "cl100k_base"
"#;

/// Keeps scheduler state out of version control.
const STATE_GITIGNORE: &str = "state.json\n.state.json.tmp\n.state.json.lock\n";

const EXAMPLE_GUIDELINES: &[(&str, &str)] = &[
    (
        "critical_git_workflow.md",
        r#"# Git Workflow Guidelines

## CRITICAL: Branch Strategy
- Always create feature branches from `main`
- Never commit directly to `main`
- Branch naming: `feature/description`, `fix/description`, `docs/description`

## Commit Messages
- Use conventional commits: `type(scope): description`
- Types: feat, fix, docs, style, refactor, test, chore
"#,
    ),
    (
        "important_code_style.md",
        r#"# Code Style Guidelines

## Rust Style
- Run `cargo fmt` and `cargo clippy` before committing
- Propagate errors with `?`; no `unwrap()` outside tests
- Doc comments on public items

## Testing Requirements
- Unit tests beside the code in `#[cfg(test)]` modules
- Cover edge cases, not just the happy path
"#,
    ),
];

/// Claude Code hook settings that run refrain.
pub fn hook_settings() -> serde_json::Value {
    let command = |event: &str| {
        serde_json::json!([{
            "hooks": [{ "type": "command", "command": format!("refrain hook {}", event) }]
        }])
    };
    serde_json::json!({
        "hooks": {
            "SessionStart": command("session-start"),
            "UserPromptSubmit": command("user-prompt-submit"),
            "PostToolUse": [{
                "matcher": "*",
                "hooks": [{ "type": "command", "command": "refrain hook post-tool-use" }]
            }]
        }
    })
}

/// The init command implementation.
pub struct InitCommand {
    root: PathBuf,
    config: Config,
}

impl InitCommand {
    /// Create a new init command for the project at `root`.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Run the init command.
    pub fn run(&self, options: &InitOptions) -> InitOutput {
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        match self.scaffold(options, &mut created, &mut skipped) {
            Ok(()) => InitOutput::success(created, skipped),
            Err(e) => InitOutput::failure(e, created, skipped),
        }
    }

    fn scaffold(
        &self,
        options: &InitOptions,
        created: &mut Vec<String>,
        skipped: &mut Vec<String>,
    ) -> Result<(), String> {
        let mut record = |written: bool, path: &Path| {
            if written {
                created.push(path.display().to_string());
            } else {
                skipped.push(path.display().to_string());
            }
        };

        let refrain_dir = project_refrain_dir(&self.root);
        record(self.ensure_dir(&refrain_dir)?, &refrain_dir);

        let config_path = project_config_path(&self.root);
        record(
            self.ensure_file(&config_path, DEFAULT_CONFIG, options.force)?,
            &config_path,
        );

        let gitignore = refrain_dir.join(".gitignore");
        record(
            self.ensure_file(&gitignore, STATE_GITIGNORE, options.force)?,
            &gitignore,
        );

        let guidelines = guidelines_dir(&self.root, &self.config.guidelines);
        record(self.ensure_dir(&guidelines)?, &guidelines);

        for (name, content) in EXAMPLE_GUIDELINES {
            let path = guidelines.join(name);
            // Never overwrite guidelines, even with --force
            record(self.ensure_file(&path, content, false)?, &path);
        }
        Ok(())
    }

    /// Ensure a directory exists.
    /// Returns Ok(true) if created, Ok(false) if already exists.
    fn ensure_dir(&self, path: &Path) -> Result<bool, String> {
        if path.exists() {
            if path.is_dir() {
                return Ok(false);
            }
            return Err(format!("{} exists but is not a directory", path.display()));
        }

        fs::create_dir_all(path)
            .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))?;

        Ok(true)
    }

    /// Ensure a file exists with the given content.
    /// Returns Ok(true) if written, Ok(false) if already exists.
    fn ensure_file(&self, path: &Path, content: &str, force: bool) -> Result<bool, String> {
        if path.exists() && !force {
            return Ok(false);
        }

        fs::write(path, content)
            .map_err(|e| format!("Failed to write file {}: {}", path.display(), e))?;

        Ok(true)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &InitOutput, options: &InitOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &InitOutput) -> String {
        let mut lines = Vec::new();

        if !output.success {
            lines.push(format!(
                "Init failed: {}",
                output.error.as_deref().unwrap_or("unknown error")
            ));
            if !output.created.is_empty() {
                lines.push(String::new());
                lines.push("Partially created before failure:".to_string());
                lines.extend(output.created.iter().map(|p| format!("  {}", p)));
            }
            return lines.join("\n") + "\n";
        }

        if !output.created.is_empty() {
            lines.push("Created:".to_string());
            lines.extend(output.created.iter().map(|p| format!("  {}", p)));
        }
        if !output.skipped.is_empty() {
            lines.push("Already exists (skipped):".to_string());
            lines.extend(output.skipped.iter().map(|p| format!("  {}", p)));
        }

        lines.push(String::new());
        lines.push("Add these hooks to .claude/settings.json:".to_string());
        lines.push(String::new());
        lines.push(serde_json::to_string_pretty(&output.hooks).unwrap_or_default());
        lines.push(String::new());
        lines.push("Guideline files named critical_* get priority 10 and are always shown;".to_string());
        lines.push("important_* files get priority 8.".to_string());

        lines.join("\n") + "\n"
    }
}
