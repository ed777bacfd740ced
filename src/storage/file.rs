//! File-based scheduler state for refrain.
//!
//! The snapshot lives at `.refrain/state.json` in the project root. Writes go
//! through a temp file and a rename so a crash mid-write never leaves a
//! truncated state file behind. Read-modify-write cycles from concurrent
//! hook processes are serialized with an advisory lock on a sibling
//! `.state.json.lock` file (the state file itself is replaced on every save,
//! so it cannot carry the lock).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::project_state_path;
use crate::core::SchedulerSnapshot;
use crate::error::{RefrainError, Result};
use crate::storage::StateStore;
use crate::util::read_to_string_limited;

/// JSON-file state store.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// State store for the project at `root`.
    pub fn for_project(root: &Path) -> Self {
        Self::with_path(project_state_path(root))
    }

    /// State store at an explicit file path. The parent directory is created
    /// on first save.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling_path(&self, suffix: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "state.json".to_string());
        self.path.with_file_name(format!(".{}.{}", name, suffix))
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling_path("tmp")
    }

    /// Path of the advisory lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.sibling_path("lock")
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| RefrainError::storage(parent, e))?;
            }
        }
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<SchedulerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = read_to_string_limited(&self.path)?;
        let snapshot: SchedulerSnapshot = serde_json::from_str(&content).map_err(|e| {
            RefrainError::serde(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SchedulerSnapshot) -> Result<()> {
        self.ensure_parent()?;

        let json = serde_json::to_string_pretty(snapshot)?;
        let temp_path = self.temp_path();
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| RefrainError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| RefrainError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| RefrainError::storage(&temp_path, e))?;
        }

        // Rename is atomic on POSIX
        fs::rename(&temp_path, &self.path).map_err(|e| RefrainError::storage(&self.path, e))?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RefrainError::storage(&self.path, e)),
        }
    }

    fn locked(&self, critical: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.ensure_parent()?;

        let lock_path = self.lock_path();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| RefrainError::storage(&lock_path, e))?;
        let mut lock = fd_lock::RwLock::new(file);
        // Blocks until other holders release; dropped (unlocked) on return
        let _guard = lock
            .write()
            .map_err(|e| RefrainError::storage(&lock_path, e))?;

        critical()
    }
}
