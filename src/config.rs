//! Configuration loading for refrain.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.refrain/config.toml`)
//! 3. User config (`~/.refrain/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The system runs with sensible defaults
//! when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{MAX_PRIORITY, MIN_PRIORITY, MIN_REPEAT_AFTER_TOKENS};
use crate::error::{RefrainError, Result};
use crate::tokens::{is_valid_encoding, VALID_ENCODINGS};

/// Name of the per-project directory holding config and state.
pub const PROJECT_DIR_NAME: &str = ".refrain";

/// Main configuration struct for refrain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Defaults for items added at runtime.
    pub scheduler: SchedulerConfig,
    /// Guidelines directory configuration.
    pub guidelines: GuidelinesConfig,
    /// Git status tracking configuration.
    pub git: GitConfig,
    /// Token counting configuration.
    pub tokens: TokensConfig,
}

/// Defaults applied to items added without explicit values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Priority for added items that do not specify one.
    pub default_priority: u8,
    /// Repetition interval for added items that do not specify one.
    pub default_repeat_after_tokens: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_priority: 5,
            default_repeat_after_tokens: 5000,
        }
    }
}

/// Guidelines directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuidelinesConfig {
    /// Directory (relative to the project root) holding `*.md` guidelines.
    pub dir: String,
    /// Priority for guidelines without a marker in their file name.
    pub default_priority: u8,
    /// Priority for files whose name contains "critical".
    pub critical_priority: u8,
    /// Priority for files whose name contains "important".
    pub important_priority: u8,
    /// Interval for guidelines at or above the force threshold.
    pub high_priority_repeat_after_tokens: u64,
    /// Interval for all other guidelines.
    pub repeat_after_tokens: u64,
    /// Whether guidelines added at runtime are written back to the directory.
    pub persist_added: bool,
}

impl Default for GuidelinesConfig {
    fn default() -> Self {
        Self {
            dir: ".claude".to_string(),
            default_priority: 5,
            critical_priority: 10,
            important_priority: 8,
            high_priority_repeat_after_tokens: 3000,
            repeat_after_tokens: 5000,
            persist_added: true,
        }
    }
}

/// Git status tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Whether git status is tracked at all.
    pub enabled: bool,
    /// Seconds between background refreshes in `serve` mode.
    pub refresh_interval_seconds: u64,
    /// Number of recent commits included in the snapshot.
    pub recent_commits: usize,
    /// Priority of the `git_status` item.
    pub status_priority: u8,
    /// Repetition interval of the `git_status` item.
    pub status_repeat_after_tokens: u64,
}

/// Minimum valid refresh interval in seconds.
pub const MIN_REFRESH_INTERVAL_SECONDS: u64 = 1;

impl GitConfig {
    /// Check if a refresh interval is valid (must be >= 1).
    pub fn is_valid_refresh_interval(value: u64) -> bool {
        value >= MIN_REFRESH_INTERVAL_SECONDS
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_seconds: 30,
            recent_commits: 5,
            status_priority: 6,
            status_repeat_after_tokens: 2000,
        }
    }
}

/// Token counting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokensConfig {
    /// Encoding name: "cl100k_base", "o200k_base", or "heuristic".
    pub encoding: String,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            encoding: "cl100k_base".to_string(),
        }
    }
}

/// Check if a priority value is valid.
fn is_valid_priority(value: u8) -> bool {
    (MIN_PRIORITY..=MAX_PRIORITY).contains(&value)
}

impl Config {
    /// Load configuration for a specific project root.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.refrain/config.toml` in the project root)
    /// 3. User config (`~/.refrain/config.toml`)
    /// 4. Defaults
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();
        for problem in config.validate() {
            tracing::warn!(problem = %problem, "invalid config value");
        }
        config
    }

    /// Load user config from `~/.refrain/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = refrain_home()?;
        Self::load_reporting(&home.join("config.toml"))
    }

    /// Load project config from `.refrain/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_reporting(&cwd.join(PROJECT_DIR_NAME).join("config.toml"))
    }

    /// Load a config file, warning about files that exist but do not parse.
    fn load_reporting(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| RefrainError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| RefrainError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // REFRAIN_DEFAULT_REPEAT
        if let Ok(val) = env::var("REFRAIN_DEFAULT_REPEAT") {
            match val.parse::<u64>() {
                Ok(n) if n >= MIN_REPEAT_AFTER_TOKENS => {
                    self.scheduler.default_repeat_after_tokens = n
                }
                _ => tracing::warn!(
                    "Invalid REFRAIN_DEFAULT_REPEAT value '{}'. \
                    Expected an integer >= {}. Using '{}'.",
                    val,
                    MIN_REPEAT_AFTER_TOKENS,
                    self.scheduler.default_repeat_after_tokens
                ),
            }
        }

        // REFRAIN_GUIDELINES_DIR
        if let Ok(val) = env::var("REFRAIN_GUIDELINES_DIR") {
            if val.trim().is_empty() {
                tracing::warn!(
                    "REFRAIN_GUIDELINES_DIR is empty. Using '{}'.",
                    self.guidelines.dir
                );
            } else {
                self.guidelines.dir = val;
            }
        }

        // REFRAIN_GIT_ENABLED
        if let Ok(val) = env::var("REFRAIN_GIT_ENABLED") {
            self.git.enabled = val == "true" || val == "1";
        }

        // REFRAIN_GIT_REFRESH_SECONDS
        if let Ok(val) = env::var("REFRAIN_GIT_REFRESH_SECONDS") {
            match val.parse::<u64>() {
                Ok(n) if GitConfig::is_valid_refresh_interval(n) => {
                    self.git.refresh_interval_seconds = n
                }
                _ => tracing::warn!(
                    "Invalid REFRAIN_GIT_REFRESH_SECONDS value '{}'. \
                    Must be >= {}. Using '{}'.",
                    val,
                    MIN_REFRESH_INTERVAL_SECONDS,
                    self.git.refresh_interval_seconds
                ),
            }
        }

        // REFRAIN_TOKEN_ENCODING
        if let Ok(val) = env::var("REFRAIN_TOKEN_ENCODING") {
            if is_valid_encoding(&val) {
                self.tokens.encoding = val;
            } else {
                tracing::warn!(
                    "Invalid REFRAIN_TOKEN_ENCODING value '{}'. \
                    Valid values: {:?}. Using '{}'.",
                    val,
                    VALID_ENCODINGS,
                    self.tokens.encoding
                );
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence field by field: every value in
    /// `other` that differs from the default overrides `self`.
    ///
    /// # Limitation
    ///
    /// A higher layer cannot set a value back to its default once a lower
    /// layer changed it, because "not set in the file" and "set to the
    /// default" deserialize identically.
    fn merge(mut self, other: Config) -> Self {
        let default_scheduler = SchedulerConfig::default();
        if other.scheduler.default_priority != default_scheduler.default_priority {
            self.scheduler.default_priority = other.scheduler.default_priority;
        }
        if other.scheduler.default_repeat_after_tokens
            != default_scheduler.default_repeat_after_tokens
        {
            self.scheduler.default_repeat_after_tokens =
                other.scheduler.default_repeat_after_tokens;
        }

        let default_guidelines = GuidelinesConfig::default();
        if other.guidelines.dir != default_guidelines.dir {
            self.guidelines.dir = other.guidelines.dir;
        }
        if other.guidelines.default_priority != default_guidelines.default_priority {
            self.guidelines.default_priority = other.guidelines.default_priority;
        }
        if other.guidelines.critical_priority != default_guidelines.critical_priority {
            self.guidelines.critical_priority = other.guidelines.critical_priority;
        }
        if other.guidelines.important_priority != default_guidelines.important_priority {
            self.guidelines.important_priority = other.guidelines.important_priority;
        }
        if other.guidelines.high_priority_repeat_after_tokens
            != default_guidelines.high_priority_repeat_after_tokens
        {
            self.guidelines.high_priority_repeat_after_tokens =
                other.guidelines.high_priority_repeat_after_tokens;
        }
        if other.guidelines.repeat_after_tokens != default_guidelines.repeat_after_tokens {
            self.guidelines.repeat_after_tokens = other.guidelines.repeat_after_tokens;
        }
        if other.guidelines.persist_added != default_guidelines.persist_added {
            self.guidelines.persist_added = other.guidelines.persist_added;
        }

        let default_git = GitConfig::default();
        if other.git.enabled != default_git.enabled {
            self.git.enabled = other.git.enabled;
        }
        if other.git.refresh_interval_seconds != default_git.refresh_interval_seconds {
            self.git.refresh_interval_seconds = other.git.refresh_interval_seconds;
        }
        if other.git.recent_commits != default_git.recent_commits {
            self.git.recent_commits = other.git.recent_commits;
        }
        if other.git.status_priority != default_git.status_priority {
            self.git.status_priority = other.git.status_priority;
        }
        if other.git.status_repeat_after_tokens != default_git.status_repeat_after_tokens {
            self.git.status_repeat_after_tokens = other.git.status_repeat_after_tokens;
        }

        if other.tokens.encoding != TokensConfig::default().encoding {
            self.tokens.encoding = other.tokens.encoding;
        }

        self
    }

    /// Check values that TOML alone cannot constrain.
    ///
    /// Returns a list of human-readable problems; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let priorities = [
            ("scheduler.default_priority", self.scheduler.default_priority),
            ("guidelines.default_priority", self.guidelines.default_priority),
            ("guidelines.critical_priority", self.guidelines.critical_priority),
            ("guidelines.important_priority", self.guidelines.important_priority),
            ("git.status_priority", self.git.status_priority),
        ];
        for (key, value) in priorities {
            if !is_valid_priority(value) {
                problems.push(format!(
                    "{} = {} is outside {}..={}",
                    key, value, MIN_PRIORITY, MAX_PRIORITY
                ));
            }
        }

        let intervals = [
            (
                "scheduler.default_repeat_after_tokens",
                self.scheduler.default_repeat_after_tokens,
            ),
            (
                "guidelines.high_priority_repeat_after_tokens",
                self.guidelines.high_priority_repeat_after_tokens,
            ),
            (
                "guidelines.repeat_after_tokens",
                self.guidelines.repeat_after_tokens,
            ),
            (
                "git.status_repeat_after_tokens",
                self.git.status_repeat_after_tokens,
            ),
        ];
        for (key, value) in intervals {
            if value < MIN_REPEAT_AFTER_TOKENS {
                problems.push(format!(
                    "{} must be at least {}",
                    key, MIN_REPEAT_AFTER_TOKENS
                ));
            }
        }

        if !GitConfig::is_valid_refresh_interval(self.git.refresh_interval_seconds) {
            problems.push(format!(
                "git.refresh_interval_seconds must be at least {}",
                MIN_REFRESH_INTERVAL_SECONDS
            ));
        }

        if !is_valid_encoding(&self.tokens.encoding) {
            problems.push(format!(
                "tokens.encoding '{}' is not one of {:?}",
                self.tokens.encoding, VALID_ENCODINGS
            ));
        }

        problems
    }
}

/// Get the refrain home directory.
///
/// Checks `REFRAIN_HOME` first, then falls back to `~/.refrain`. An empty
/// `REFRAIN_HOME` is ignored.
pub fn refrain_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("REFRAIN_HOME") {
        if home.is_empty() {
            tracing::warn!("REFRAIN_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("REFRAIN_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".refrain"));
    }

    let fallback_path = env::temp_dir().join("refrain");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

/// Find the project root for a given working directory.
///
/// Precedence:
///
/// 1. The nearest ancestor (or `cwd` itself) containing a `.refrain/`
///    directory.
/// 2. The git repository root from `git rev-parse --show-toplevel`.
/// 3. `cwd` itself.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    for ancestor in cwd.ancestors() {
        if ancestor.join(PROJECT_DIR_NAME).is_dir() {
            return ancestor.to_path_buf();
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(cwd)
        .output()
    {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
        }
    }

    cwd.to_path_buf()
}

/// `<root>/.refrain/`
pub fn project_refrain_dir(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR_NAME)
}

/// `<root>/.refrain/state.json`
pub fn project_state_path(root: &Path) -> PathBuf {
    project_refrain_dir(root).join("state.json")
}

/// `<root>/.refrain/config.toml`
pub fn project_config_path(root: &Path) -> PathBuf {
    project_refrain_dir(root).join("config.toml")
}

/// `<root>/<guidelines.dir>/`
pub fn guidelines_dir(root: &Path, config: &GuidelinesConfig) -> PathBuf {
    root.join(&config.dir)
}
