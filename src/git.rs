//! Git status snapshots.
//!
//! Shells out to `git` in the project root and collects the pieces that are
//! useful to keep in front of the model: branch, short status, recent
//! commits, staged/unstaged file counts, remotes, and the stash depth. The
//! scheduler never sees git directly; a snapshot is serialized into the
//! `git_status` context item.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GitConfig;
use crate::core::{Category, ContextItem};
use crate::error::{RefrainError, Result};

/// Id of the context item carrying git status.
pub const GIT_STATUS_ITEM_ID: &str = "git_status";

/// Counts of files with uncommitted changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Files with staged changes.
    pub staged_files: usize,
    /// Files with unstaged changes.
    pub unstaged_files: usize,
}

/// Structured git status at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitSnapshot {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Current branch (empty when detached).
    pub branch: String,
    /// `git status --short` output.
    pub status: String,
    /// `git log --oneline --decorate` lines, newest first.
    pub recent_commits: Vec<String>,
    /// Staged and unstaged file counts.
    pub uncommitted_changes: DiffStats,
    /// `git remote -v` lines.
    pub remotes: Vec<String>,
    /// Number of stash entries.
    pub stash_count: usize,
}

impl GitSnapshot {
    /// Pretty JSON rendering used as item content.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RefrainError::serde(format!("Failed to serialize git snapshot: {}", e)))
    }

    /// Whether both snapshots describe the same repository state, ignoring
    /// when they were taken.
    pub fn same_state(&self, other: &GitSnapshot) -> bool {
        self.branch == other.branch
            && self.status == other.status
            && self.recent_commits == other.recent_commits
            && self.uncommitted_changes == other.uncommitted_changes
            && self.remotes == other.remotes
            && self.stash_count == other.stash_count
    }
}

/// Supplies git status snapshots on demand.
pub trait GitStatusProvider: Send + Sync {
    /// Take a fresh snapshot.
    fn snapshot(&self) -> Result<GitSnapshot>;
}

impl<T: GitStatusProvider + ?Sized> GitStatusProvider for std::sync::Arc<T> {
    fn snapshot(&self) -> Result<GitSnapshot> {
        (**self).snapshot()
    }
}

/// Provider that runs the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    recent_commits: usize,
}

impl GitCli {
    /// Create a provider for the repository at `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>, recent_commits: usize) -> Self {
        Self {
            repo_path: repo_path.into(),
            recent_commits,
        }
    }

    /// Repository path the provider runs in.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Run `git <args>` and return trimmed stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| RefrainError::git(format!("failed to run git {}: {}", args.join(" "), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RefrainError::git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl GitStatusProvider for GitCli {
    fn snapshot(&self) -> Result<GitSnapshot> {
        let log_count = format!("-{}", self.recent_commits);

        let branch = self.run(&["branch", "--show-current"])?;
        let status = self.run(&["status", "--short"])?;
        // A repository without commits has no log; treat it as empty history.
        let recent_commits = self
            .run(&["log", &log_count, "--oneline", "--decorate"])
            .map(|out| non_empty_lines(&out))
            .unwrap_or_default();
        let staged = self.run(&["diff", "--cached", "--numstat"])?;
        let unstaged = self.run(&["diff", "--numstat"])?;
        let remotes = self.run(&["remote", "-v"])?;
        let stash = self.run(&["stash", "list"])?;

        Ok(GitSnapshot {
            timestamp: Utc::now(),
            branch,
            status,
            recent_commits,
            uncommitted_changes: DiffStats {
                staged_files: non_empty_lines(&staged).len(),
                unstaged_files: non_empty_lines(&unstaged).len(),
            },
            remotes: non_empty_lines(&remotes),
            stash_count: non_empty_lines(&stash).len(),
        })
    }
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the `git_status` context item from a snapshot.
pub fn status_item(snapshot: &GitSnapshot, config: &GitConfig) -> Result<ContextItem> {
    ContextItem::new(
        GIT_STATUS_ITEM_ID,
        snapshot.to_json_pretty()?,
        config.status_priority,
        Category::State,
        config.status_repeat_after_tokens,
    )
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Provider returning a canned snapshot, or failing when asked to.
    pub struct FakeGit {
        pub branch: String,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeGit {
        pub fn on_branch(branch: &str) -> Self {
            Self {
                branch: branch.to_string(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                branch: String::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GitStatusProvider for FakeGit {
        fn snapshot(&self) -> Result<GitSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RefrainError::git("not a git repository"));
            }
            Ok(GitSnapshot {
                timestamp: Utc::now(),
                branch: self.branch.clone(),
                status: " M src/lib.rs".to_string(),
                recent_commits: vec!["abc1234 (HEAD -> main) Initial commit".to_string()],
                uncommitted_changes: DiffStats {
                    staged_files: 0,
                    unstaged_files: 1,
                },
                remotes: Vec::new(),
                stash_count: 0,
            })
        }
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {:?} failed", args);
    }

    #[test]
    fn test_non_empty_lines() {
        assert!(non_empty_lines("").is_empty());
        assert_eq!(non_empty_lines("a\n\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_status_item_uses_config() {
        let snapshot = FakeGit::on_branch("feature/x").snapshot().unwrap();
        let config = GitConfig::default();
        let item = status_item(&snapshot, &config).unwrap();

        assert_eq!(item.id(), GIT_STATUS_ITEM_ID);
        assert_eq!(item.category(), Category::State);
        assert_eq!(item.priority(), 6);
        assert_eq!(item.repeat_after_tokens(), 2000);

        let parsed: serde_json::Value = serde_json::from_str(item.content()).unwrap();
        assert_eq!(parsed["branch"], "feature/x");
        assert_eq!(parsed["uncommitted_changes"]["unstaged_files"], 1);
    }

    #[test]
    fn test_same_state_ignores_timestamp() {
        let git = FakeGit::on_branch("main");
        let first = git.snapshot().unwrap();
        let mut second = git.snapshot().unwrap();
        second.timestamp = first.timestamp + chrono::Duration::seconds(30);
        assert!(first.same_state(&second));

        second.stash_count = 1;
        assert!(!first.same_state(&second));
    }

    #[test]
    fn test_status_item_rejects_bad_config() {
        let snapshot = FakeGit::on_branch("main").snapshot().unwrap();
        let config = GitConfig {
            status_priority: 0,
            ..Default::default()
        };
        assert!(status_item(&snapshot, &config).is_err());
    }

    #[test]
    fn test_snapshot_outside_repository_fails() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let provider = GitCli::new(dir.path(), 5);
        assert!(matches!(
            provider.snapshot(),
            Err(RefrainError::Git { .. })
        ));
    }

    #[test]
    fn test_snapshot_of_real_repository() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]);
        git(dir.path(), &["config", "user.email", "dev@example.com"]);
        git(dir.path(), &["config", "user.name", "Dev"]);
        fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        git(dir.path(), &["add", "a.txt"]);
        git(
            dir.path(),
            &["-c", "commit.gpgsign=false", "commit", "-q", "-m", "first"],
        );
        fs::write(dir.path().join("a.txt"), "two\n").unwrap();

        let snapshot = GitCli::new(dir.path(), 5).snapshot().unwrap();
        assert_eq!(snapshot.branch, "main");
        assert_eq!(snapshot.recent_commits.len(), 1);
        assert!(snapshot.recent_commits[0].contains("first"));
        assert_eq!(snapshot.uncommitted_changes.unstaged_files, 1);
        assert_eq!(snapshot.uncommitted_changes.staged_files, 0);
        assert!(snapshot.status.contains("a.txt"));
        assert_eq!(snapshot.stash_count, 0);
        assert!(snapshot.remotes.is_empty());
    }
}
