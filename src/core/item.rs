//! Context item entity.
//!
//! A context item is one blurb of text that should be re-surfaced to the model
//! every so often. Items are validated once at construction and then only ever
//! replaced wholesale; the one field that moves is the watermark recording
//! when the item was last shown.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RefrainError, Result};

/// Lowest accepted priority.
pub const MIN_PRIORITY: u8 = 1;

/// Highest accepted priority.
pub const MAX_PRIORITY: u8 = 10;

/// Items at or above this priority are shown on every query.
pub const PRIORITY_FORCE_THRESHOLD: u8 = 8;

/// Smallest accepted repetition interval.
pub const MIN_REPEAT_AFTER_TOKENS: u64 = 1;

/// Category of a context item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A project rule or convention.
    Guideline,
    /// Live repository or session state.
    State,
    /// Reference documentation.
    Documentation,
}

impl Category {
    /// Get all category variants.
    pub fn all() -> &'static [Category] {
        &[Category::Guideline, Category::State, Category::Documentation]
    }

    /// The wire name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Guideline => "guideline",
            Category::State => "state",
            Category::Documentation => "documentation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RefrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "guideline" => Ok(Category::Guideline),
            "state" => Ok(Category::State),
            "documentation" => Ok(Category::Documentation),
            other => Err(RefrainError::invalid_item(format!(
                "unknown category '{}' (expected guideline, state, or documentation)",
                other
            ))),
        }
    }
}

/// A piece of context with a priority and a token-based repetition policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    id: String,
    content: String,
    priority: u8,
    category: Category,
    last_shown_at_token: u64,
    repeat_after_tokens: u64,
    created_at: DateTime<Utc>,
}

impl ContextItem {
    /// Create a validated context item.
    ///
    /// Rejects an empty id, a priority outside `1..=10`, and a repetition
    /// interval below 1. The watermark starts at 0.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        priority: u8,
        category: Category,
        repeat_after_tokens: u64,
    ) -> Result<Self> {
        let item = Self {
            id: id.into(),
            content: content.into(),
            priority,
            category,
            last_shown_at_token: 0,
            repeat_after_tokens,
            created_at: Utc::now(),
        };
        item.validate()?;
        Ok(item)
    }

    /// Check the construction invariants.
    ///
    /// Called by [`ContextItem::new`] and again for items read back from disk,
    /// since a hand-edited state file bypasses the constructor.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RefrainError::invalid_item("id must not be empty"));
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(RefrainError::invalid_item(format!(
                "priority {} for '{}' is outside {}..={}",
                self.priority, self.id, MIN_PRIORITY, MAX_PRIORITY
            )));
        }
        if self.repeat_after_tokens < MIN_REPEAT_AFTER_TOKENS {
            return Err(RefrainError::invalid_item(format!(
                "repeat_after_tokens for '{}' must be at least {}",
                self.id, MIN_REPEAT_AFTER_TOKENS
            )));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Counter value at which this item was last shown because it was due.
    pub fn last_shown_at_token(&self) -> u64 {
        self.last_shown_at_token
    }

    pub fn repeat_after_tokens(&self) -> u64 {
        self.repeat_after_tokens
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether this item is shown regardless of its interval.
    pub fn is_priority_forced(&self) -> bool {
        self.priority >= PRIORITY_FORCE_THRESHOLD
    }

    /// Whether the repetition interval has elapsed at counter value `now`.
    pub fn is_interval_due(&self, now: u64) -> bool {
        now.saturating_sub(self.last_shown_at_token) >= self.repeat_after_tokens
    }

    /// Tokens left before the item becomes interval-due, if any remain.
    ///
    /// Returns `None` once the item is already due.
    pub fn tokens_until_due(&self, now: u64) -> Option<u64> {
        self.last_shown_at_token
            .saturating_add(self.repeat_after_tokens)
            .checked_sub(now)
            .filter(|remaining| *remaining > 0)
    }

    /// Copy of this item carrying `content`. Priority, category, and
    /// interval are kept; the copy is stamped as newly created.
    pub fn with_content(&self, content: impl Into<String>) -> ContextItem {
        ContextItem {
            content: content.into(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    pub(crate) fn mark_shown(&mut self, now: u64) {
        self.last_shown_at_token = now;
    }

    pub(crate) fn reset_watermark(&mut self) {
        self.last_shown_at_token = 0;
    }
}
