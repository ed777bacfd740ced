//! Guidelines directory.
//!
//! Every `*.md` file in the guidelines directory becomes a `guideline` context
//! item. Priority comes from the file name: names containing "critical" or
//! "important" are promoted, everything else gets the default. Guidelines
//! added at runtime can be written back as `<id>.md`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::GuidelinesConfig;
use crate::core::{Category, ContextItem, PRIORITY_FORCE_THRESHOLD};
use crate::error::{RefrainError, Result};
use crate::util::read_to_string_limited;

/// Prefix shared by ids of items loaded from guideline files.
pub const GUIDELINE_ID_PREFIX: &str = "guideline_";

/// File-backed collection of guideline items.
#[derive(Debug, Clone)]
pub struct GuidelineLibrary {
    dir: PathBuf,
    config: GuidelinesConfig,
}

impl GuidelineLibrary {
    /// Create a library over `dir`. The directory need not exist yet.
    pub fn new(dir: impl Into<PathBuf>, config: GuidelinesConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    /// Directory holding the guideline files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| RefrainError::storage(&self.dir, e))?;
        }
        Ok(())
    }

    /// Item id for a guideline file stem.
    pub fn id_for_stem(stem: &str) -> String {
        if stem.starts_with(GUIDELINE_ID_PREFIX) {
            stem.to_string()
        } else {
            format!("{}{}", GUIDELINE_ID_PREFIX, stem)
        }
    }

    /// Priority implied by a file stem.
    pub fn priority_for_stem(&self, stem: &str) -> u8 {
        let lower = stem.to_lowercase();
        if lower.contains("critical") {
            self.config.critical_priority
        } else if lower.contains("important") {
            self.config.important_priority
        } else {
            self.config.default_priority
        }
    }

    /// Repetition interval for a guideline of the given priority.
    pub fn repeat_for_priority(&self, priority: u8) -> u64 {
        if priority >= PRIORITY_FORCE_THRESHOLD {
            self.config.high_priority_repeat_after_tokens
        } else {
            self.config.repeat_after_tokens
        }
    }

    /// Load every `*.md` file in the directory, sorted by file name.
    ///
    /// A missing directory yields no items. Files that cannot be read or turn
    /// into an invalid item are skipped with a warning.
    pub fn load(&self) -> Result<Vec<ContextItem>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| RefrainError::storage(&self.dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        let mut items = Vec::new();
        for path in paths {
            match self.load_file(&path) {
                Ok(item) => {
                    tracing::info!(id = item.id(), priority = item.priority(), "loaded guideline");
                    items.push(item);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping guideline");
                }
            }
        }

        Ok(items)
    }

    fn load_file(&self, path: &Path) -> Result<ContextItem> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| RefrainError::invalid_item("guideline file has no name"))?;
        let content = read_to_string_limited(path)?;
        let priority = self.priority_for_stem(&stem);

        ContextItem::new(
            Self::id_for_stem(&stem),
            content,
            priority,
            Category::Guideline,
            self.repeat_for_priority(priority),
        )
    }

    fn path_for_id(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.md", id))
    }

    /// Write an item's content to `<id>.md`, replacing any previous file.
    pub fn save(&self, item: &ContextItem) -> Result<PathBuf> {
        if item.id().contains(['/', '\\']) || item.id().starts_with('.') {
            return Err(RefrainError::invalid_item(format!(
                "'{}' cannot be used as a guideline file name",
                item.id()
            )));
        }
        self.ensure_dir()?;

        let final_path = self.path_for_id(item.id());
        let temp_path = self.dir.join(format!(".{}.md.tmp", item.id()));
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| RefrainError::storage(&temp_path, e))?;
            file.write_all(item.content().as_bytes())
                .map_err(|e| RefrainError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| RefrainError::storage(&temp_path, e))?;
        }
        fs::rename(&temp_path, &final_path).map_err(|e| RefrainError::storage(&final_path, e))?;

        Ok(final_path)
    }

    /// Delete the file backing `id`, if there is one.
    ///
    /// Only `guideline_` ids are backed by files; any other id is left
    /// alone. Checks both `<id>.md` and the unprefixed stem. Returns true if
    /// a file was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let Some(stem) = id.strip_prefix(GUIDELINE_ID_PREFIX) else {
            return Ok(false);
        };
        let candidates = [self.path_for_id(id), self.path_for_id(stem)];

        let mut removed = false;
        for path in candidates {
            if path.is_file() {
                fs::remove_file(&path).map_err(|e| RefrainError::storage(&path, e))?;
                removed = true;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> (GuidelineLibrary, TempDir) {
        let dir = TempDir::new().unwrap();
        let library = GuidelineLibrary::new(dir.path().join(".claude"), GuidelinesConfig::default());
        (library, dir)
    }

    #[test]
    fn test_load_missing_dir_is_empty() {
        let (library, _dir) = library();
        assert!(library.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_assigns_priorities_and_intervals() {
        let (library, _dir) = library();
        library.ensure_dir().unwrap();
        fs::write(library.dir().join("critical-security.md"), "Never log secrets").unwrap();
        fs::write(library.dir().join("IMPORTANT_style.md"), "Use rustfmt").unwrap();
        fs::write(library.dir().join("workflow.md"), "Small commits").unwrap();
        fs::write(library.dir().join("notes.txt"), "ignored").unwrap();

        let items = library.load().unwrap();
        assert_eq!(items.len(), 3);

        let find = |id: &str| items.iter().find(|i| i.id() == id).unwrap();

        let critical = find("guideline_critical-security");
        assert_eq!(critical.priority(), 10);
        assert_eq!(critical.repeat_after_tokens(), 3000);
        assert_eq!(critical.content(), "Never log secrets");
        assert_eq!(critical.category(), Category::Guideline);

        let important = find("guideline_IMPORTANT_style");
        assert_eq!(important.priority(), 8);
        assert_eq!(important.repeat_after_tokens(), 3000);

        let plain = find("guideline_workflow");
        assert_eq!(plain.priority(), 5);
        assert_eq!(plain.repeat_after_tokens(), 5000);
    }

    #[test]
    fn test_load_is_sorted_by_file_name() {
        let (library, _dir) = library();
        library.ensure_dir().unwrap();
        fs::write(library.dir().join("b.md"), "b").unwrap();
        fs::write(library.dir().join("a.md"), "a").unwrap();

        let ids: Vec<String> = library
            .load()
            .unwrap()
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        assert_eq!(ids, vec!["guideline_a", "guideline_b"]);
    }

    #[test]
    fn test_id_for_stem_does_not_double_prefix() {
        assert_eq!(GuidelineLibrary::id_for_stem("style"), "guideline_style");
        assert_eq!(
            GuidelineLibrary::id_for_stem("guideline_style"),
            "guideline_style"
        );
    }

    #[test]
    fn test_save_then_load_keeps_id() {
        let (library, _dir) = library();
        let item =
            ContextItem::new("guideline_testing", "Run cargo test", 5, Category::Guideline, 10)
                .unwrap();

        let path = library.save(&item).unwrap();
        assert!(path.ends_with("guideline_testing.md"));

        let loaded = library.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), "guideline_testing");
        assert_eq!(loaded[0].content(), "Run cargo test");
    }

    #[test]
    fn test_save_rejects_path_like_ids() {
        let (library, _dir) = library();
        let item = ContextItem::new("../escape", "x", 5, Category::Guideline, 10).unwrap();
        assert!(library.save(&item).is_err());
    }

    #[test]
    fn test_delete() {
        let (library, _dir) = library();
        library.ensure_dir().unwrap();
        fs::write(library.dir().join("style.md"), "x").unwrap();

        assert!(library.delete("guideline_style").unwrap());
        assert!(!library.dir().join("style.md").exists());
        assert!(!library.delete("guideline_style").unwrap());
    }

    #[test]
    fn test_delete_ignores_unprefixed_ids() {
        let (library, _dir) = library();
        library.ensure_dir().unwrap();
        fs::write(library.dir().join("foo.md"), "unrelated").unwrap();

        assert!(!library.delete("foo").unwrap());
        assert!(library.dir().join("foo.md").is_file());
    }
}
