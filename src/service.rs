//! Context service: the boundary the serve loop, hooks, and CLI talk to.
//!
//! A [`ContextService`] owns one [`SharedScheduler`] plus its collaborators
//! (token counter, git provider, guidelines library, state store). With a
//! state store attached, every operation that changes the scheduler runs as
//! one locked load, apply, save cycle, so concurrent hook processes and a
//! long-running `serve` see each other's work without losing updates.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::{guidelines_dir, Config};
use crate::core::{
    Category, ContextItem, RepetitionScheduler, SharedScheduler, Summary,
};
use crate::error::{FailOpen, RefrainError, Result};
use crate::git::{status_item, GitCli, GitSnapshot, GitStatusProvider, GIT_STATUS_ITEM_ID};
use crate::guidelines::{GuidelineLibrary, GUIDELINE_ID_PREFIX};
use crate::storage::{FileStateStore, StateStore};
use crate::tokens::{counter_for, TokenCounter};
use crate::util::display_name;

/// Text returned by `active_context` when nothing is due.
pub const NO_ACTIVE_CONTEXTS: &str = "No active contexts to show currently.";

/// Text returned by `read_resource` for unknown URIs.
pub const RESOURCE_NOT_FOUND: &str = "Resource not found";

/// URI of the live git status resource.
pub const GIT_STATUS_URI: &str = "git://status";

/// URI of the rendered due items.
pub const ACTIVE_CONTEXT_URI: &str = "context://active";

const CONTEXT_URI_PREFIX: &str = "context://";
const MIME_JSON: &str = "application/json";
const MIME_MARKDOWN: &str = "text/markdown";
const MIME_TEXT: &str = "text/plain";

/// Parameters for adding an item. Omitted fields take configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_after_tokens: Option<i64>,
}

impl AddItemRequest {
    /// Request with only the required fields set.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Result of a git refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The `git_status` item was replaced with a fresh snapshot.
    Updated,
    /// Git state matched the stored item; the item was left untouched.
    Unchanged,
    /// Git integration is turned off in config.
    Disabled,
    /// The snapshot could not be taken; nothing was changed.
    Failed(String),
}

impl RefreshOutcome {
    /// True if the scheduler was modified.
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }

    /// Human-readable result.
    pub fn message(&self) -> String {
        match self {
            Self::Updated => "Refreshed git status and contexts".to_string(),
            Self::Unchanged => "Git status unchanged".to_string(),
            Self::Disabled => "Git integration is disabled; no update performed".to_string(),
            Self::Failed(reason) => format!("No update performed: {}", reason),
        }
    }
}

/// A readable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
}

/// Contents of a resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// Render due items as markdown blocks separated by horizontal rules.
pub fn render_items(items: &[ContextItem]) -> String {
    if items.is_empty() {
        return NO_ACTIVE_CONTEXTS.to_string();
    }
    items
        .iter()
        .map(|item| format!("# {} (Priority: {})\n\n{}", item.id(), item.priority(), item.content()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Scheduler plus collaborators for one project.
pub struct ContextService {
    root: PathBuf,
    config: Config,
    scheduler: SharedScheduler,
    counter: Arc<dyn TokenCounter>,
    git: Option<Arc<dyn GitStatusProvider>>,
    guidelines: GuidelineLibrary,
    state: Option<Arc<dyn StateStore>>,
    // Serializes transactions from the serve loop and the refresh ticker.
    persist_lock: Mutex<()>,
}

impl std::fmt::Debug for ContextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextService")
            .field("root", &self.root)
            .field("counter", &self.counter.name())
            .field("git", &self.git.is_some())
            .field("state", &self.state.is_some())
            .finish()
    }
}

impl ContextService {
    /// Open the service for a project with production collaborators:
    /// the configured tokenizer, `git` in the project root, and the state
    /// file under `.refrain/`. Guidelines are synced after the saved state
    /// is restored.
    pub fn open(root: &Path, config: Config) -> Self {
        let counter = counter_for(&config.tokens.encoding);
        let git: Option<Arc<dyn GitStatusProvider>> = if config.git.enabled {
            Some(Arc::new(GitCli::new(root, config.git.recent_commits)))
        } else {
            None
        };
        let state: Arc<dyn StateStore> = Arc::new(FileStateStore::for_project(root));

        let service = Self::with_parts(root, config, counter, git, Some(state));
        service.sync_guidelines();
        service
    }

    /// Assemble a service from explicit collaborators.
    ///
    /// The saved snapshot, if any, is restored. A missing or unreadable
    /// snapshot starts an empty scheduler.
    pub fn with_parts(
        root: &Path,
        config: Config,
        counter: Arc<dyn TokenCounter>,
        git: Option<Arc<dyn GitStatusProvider>>,
        state: Option<Arc<dyn StateStore>>,
    ) -> Self {
        let scheduler = match &state {
            Some(store) => store
                .load()
                .and_then(|snapshot| snapshot.map(RepetitionScheduler::restore).transpose())
                .fail_open_default("loading scheduler state")
                .unwrap_or_default(),
            None => RepetitionScheduler::new(),
        };
        tracing::debug!(
            items = scheduler.store().len(),
            tokens = scheduler.token_count(),
            "scheduler ready"
        );

        let guidelines = GuidelineLibrary::new(
            guidelines_dir(root, &config.guidelines),
            config.guidelines.clone(),
        );

        Self {
            root: root.to_path_buf(),
            config,
            scheduler: SharedScheduler::new(scheduler),
            counter,
            git,
            guidelines,
            state,
            persist_lock: Mutex::new(()),
        }
    }

    /// Project root the service operates on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the underlying scheduler.
    pub fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    pub fn guidelines(&self) -> &GuidelineLibrary {
        &self.guidelines
    }

    /// Name of the active tokenizer.
    pub fn counter_name(&self) -> &str {
        self.counter.name()
    }

    /// Reconcile guideline items with the guidelines directory.
    ///
    /// New files are `put`. A file whose content changed replaces the
    /// content of its item but keeps the stored priority and interval, so
    /// values given when the guideline was added survive a reload. Unchanged
    /// files leave their item alone.
    /// Guideline-prefixed items whose file has disappeared are removed.
    /// Returns the number of items that changed.
    pub fn sync_guidelines(&self) -> usize {
        let loaded = self
            .guidelines
            .load()
            .fail_open_default("loading guidelines");

        let changed = self.mutate(|scheduler| {
            let mut changed = 0;
            for item in &loaded {
                if scheduler.put_if_changed(item.clone()) {
                    changed += 1;
                }
            }

            let stale: Vec<String> = scheduler
                .items()
                .into_iter()
                .filter(|item| {
                    item.category() == Category::Guideline
                        && item.id().starts_with(GUIDELINE_ID_PREFIX)
                        && !loaded.iter().any(|l| l.id() == item.id())
                })
                .map(|item| item.id().to_string())
                .collect();
            for id in stale {
                if scheduler.remove(&id) {
                    tracing::info!(id = %id, "dropped guideline with no backing file");
                    changed += 1;
                }
            }
            changed
        });

        if changed > 0 {
            tracing::info!(count = changed, "synced guidelines");
        }
        changed
    }

    /// Add or replace an item.
    ///
    /// Guideline items are written to the guidelines directory when
    /// `guidelines.persist_added` is on; their id is normalized to the
    /// `guideline_` form so reloading the file yields the same id.
    pub fn add_item(&self, request: AddItemRequest) -> Result<String> {
        let priority = match request.priority {
            Some(p) => u8::try_from(p).map_err(|_| {
                RefrainError::invalid_item(format!("priority {} for '{}' is out of range", p, request.id))
            })?,
            None => self.config.scheduler.default_priority,
        };
        let repeat = match request.repeat_after_tokens {
            Some(r) => u64::try_from(r).map_err(|_| {
                RefrainError::invalid_item(format!(
                    "repeat_after_tokens {} for '{}' must be positive",
                    r, request.id
                ))
            })?,
            None => self.config.scheduler.default_repeat_after_tokens,
        };
        let category = request.category.unwrap_or(Category::Guideline);

        let persist_file = category == Category::Guideline && self.config.guidelines.persist_added;
        let id = if persist_file {
            GuidelineLibrary::id_for_stem(request.id.trim())
        } else {
            request.id
        };

        let item = ContextItem::new(id, request.content, priority, category, repeat)?;
        if persist_file {
            self.guidelines.save(&item)?;
        }

        let id = item.id().to_string();
        let replaced = self.mutate(|scheduler| scheduler.put(item.clone()));
        tracing::info!(id = %id, priority, replaced, "added context");

        Ok(format!("Added context: {}", id))
    }

    /// Remove an item by id, deleting its guideline file if it has one.
    pub fn remove_item(&self, id: &str) -> String {
        let (existing, removed) =
            self.mutate(|scheduler| (scheduler.get(id), scheduler.remove(id)));

        if removed {
            let backed_by_file = existing.is_some_and(|item| {
                item.category() == Category::Guideline && item.id().starts_with(GUIDELINE_ID_PREFIX)
            });
            if backed_by_file
                && self
                    .guidelines
                    .delete(id)
                    .fail_open_with("deleting guideline file", false)
            {
                tracing::debug!(id = %id, "deleted guideline file");
            }
            tracing::info!(id = %id, "removed context");
            format!("Removed context: {}", id)
        } else {
            format!("Failed to remove context: {}", id)
        }
    }

    /// Record consumption of `text`. Returns the token count of `text`.
    pub fn track_tokens(&self, text: &str) -> u64 {
        self.mutate(|scheduler| scheduler.record_text(text, self.counter.as_ref()))
    }

    /// Record a precomputed token count. Returns the new counter value.
    pub fn record_tokens(&self, tokens: u64) -> u64 {
        self.mutate(|scheduler| scheduler.record_tokens(tokens))
    }

    pub fn summary(&self) -> Summary {
        self.scheduler.summary()
    }

    pub fn get_item(&self, id: &str) -> Option<ContextItem> {
        self.scheduler.get(id)
    }

    /// Every item in store order.
    pub fn items(&self) -> Vec<ContextItem> {
        self.scheduler.items()
    }

    /// Take a fresh git snapshot and replace the `git_status` item.
    ///
    /// A git failure leaves the scheduler untouched.
    pub fn force_refresh(&self) -> RefreshOutcome {
        self.refresh_git(false)
    }

    /// Like [`force_refresh`](Self::force_refresh), but leaves the item (and
    /// its watermark) alone when nothing but the timestamp changed.
    pub fn refresh_if_changed(&self) -> RefreshOutcome {
        self.refresh_git(true)
    }

    fn refresh_git(&self, only_if_changed: bool) -> RefreshOutcome {
        let Some(git) = &self.git else {
            return RefreshOutcome::Disabled;
        };

        let snapshot = match git.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "git refresh failed, no update performed");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let item = match status_item(&snapshot, &self.config.git) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(error = %e, "could not build git status item");
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let updated = self.mutate(|scheduler| {
            if only_if_changed && stored_git_matches(scheduler, &snapshot) {
                return false;
            }
            scheduler.put(item.clone());
            true
        });

        if updated {
            tracing::info!(branch = %snapshot.branch, "updated git status");
            RefreshOutcome::Updated
        } else {
            tracing::debug!("git status unchanged");
            RefreshOutcome::Unchanged
        }
    }

    /// Items due now, in presentation order. Moves watermarks.
    pub fn due_items(&self) -> Vec<ContextItem> {
        self.mutate(|scheduler| scheduler.compute_due())
    }

    /// Due items rendered as markdown.
    pub fn active_context(&self) -> String {
        render_items(&self.due_items())
    }

    /// Resources a client can read: git status, every item, and the active
    /// context view.
    pub fn list_resources(&self) -> Vec<Resource> {
        let mut resources = vec![Resource {
            uri: GIT_STATUS_URI.to_string(),
            name: "Current Git Status".to_string(),
            mime_type: MIME_JSON.to_string(),
        }];

        resources.extend(self.scheduler.items().iter().map(|item| Resource {
            uri: format!("{}{}", CONTEXT_URI_PREFIX, item.id()),
            name: display_name(item.id()),
            mime_type: MIME_MARKDOWN.to_string(),
        }));

        resources.push(Resource {
            uri: ACTIVE_CONTEXT_URI.to_string(),
            name: "Active Context Items".to_string(),
            mime_type: MIME_MARKDOWN.to_string(),
        });
        resources
    }

    /// Read a resource by URI.
    ///
    /// `git://status` takes a fresh snapshot without touching the scheduler;
    /// a failure is reported as `{"error": ...}`. Unknown URIs yield
    /// [`RESOURCE_NOT_FOUND`].
    pub fn read_resource(&self, uri: &str) -> ResourceContent {
        let content = |mime: &str, text: String| ResourceContent {
            uri: uri.to_string(),
            mime_type: mime.to_string(),
            text,
        };

        if uri == GIT_STATUS_URI {
            let result = match &self.git {
                Some(git) => git.snapshot().and_then(|s| s.to_json_pretty()),
                None => Err(RefrainError::git("git integration is disabled")),
            };
            let text = result.unwrap_or_else(|e| {
                let body = serde_json::json!({ "error": e.to_string() });
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())
            });
            return content(MIME_JSON, text);
        }

        if uri == ACTIVE_CONTEXT_URI {
            return content(MIME_MARKDOWN, self.active_context());
        }

        if let Some(item) = uri
            .strip_prefix(CONTEXT_URI_PREFIX)
            .and_then(|id| self.scheduler.get(id))
        {
            return content(MIME_MARKDOWN, item.content().to_string());
        }

        content(MIME_TEXT, RESOURCE_NOT_FOUND.to_string())
    }

    /// Re-read the saved snapshot so reads see changes made by other
    /// processes. No-op without a state store.
    pub fn reload(&self) {
        if let Some(state) = &self.state {
            self.reload_from(&**state);
        }
    }

    fn reload_from(&self, state: &dyn StateStore) {
        let restored = state
            .load()
            .and_then(|snapshot| snapshot.map(RepetitionScheduler::restore).transpose())
            .fail_open_default("reloading scheduler state");
        if let Some(scheduler) = restored {
            self.scheduler.replace(scheduler);
        }
    }

    /// Apply `op` as one transaction against the state store.
    ///
    /// Under the store's lock the scheduler is reloaded from the saved
    /// snapshot, `op` runs, and the result is saved. If the store cannot be
    /// locked or written, `op` still runs against the in-memory scheduler.
    fn mutate<T>(&self, mut op: impl FnMut(&SharedScheduler) -> T) -> T {
        let Some(state) = &self.state else {
            return op(&self.scheduler);
        };
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut output = None;
        let result = state.locked(&mut || {
            self.reload_from(&**state);
            output = Some(op(&self.scheduler));
            state.save(&self.scheduler.snapshot())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "saving scheduler state failed (fail-open: kept in memory)");
        }

        match output {
            Some(output) => output,
            None => op(&self.scheduler),
        }
    }
}

fn stored_git_matches(scheduler: &SharedScheduler, snapshot: &GitSnapshot) -> bool {
    scheduler
        .get(GIT_STATUS_ITEM_ID)
        .and_then(|item| serde_json::from_str::<GitSnapshot>(item.content()).ok())
        .is_some_and(|stored| stored.same_state(snapshot))
}
