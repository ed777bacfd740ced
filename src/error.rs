//! Unified error types for refrain with fail-open handling at the edges.
//!
//! The scheduler core only ever fails on invalid input. Everything that talks
//! to the outside world (git, the tokenizer, the state file, guideline files)
//! recovers locally: it logs a warning and carries on with a safe default so a
//! broken collaborator never takes the scheduler down with it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for refrain operations.
#[derive(Error, Debug)]
pub enum RefrainError {
    /// I/O errors from state, guideline, or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// A context item failed construction-time validation.
    #[error("invalid context item: {message}")]
    InvalidContextItem { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// A git command could not be run or returned a failure.
    #[error("git error: {message}")]
    Git { message: String },

    /// The tokenizer could not be loaded.
    #[error("tokenizer error: {message}")]
    Tokenizer { message: String },

    /// Malformed or unknown request on the serve loop.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

/// A specialized Result type for refrain operations.
pub type Result<T> = std::result::Result<T, RefrainError>;

impl RefrainError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create an invalid context item error.
    pub fn invalid_item(message: impl Into<String>) -> Self {
        Self::InvalidContextItem {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a git error.
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a tokenizer error.
    pub fn tokenizer(message: impl Into<String>) -> Self {
        Self::Tokenizer {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether this error comes from a collaborator that should be recovered
    /// locally rather than surfaced to the caller.
    ///
    /// Validation and protocol errors are the caller's fault and are reported;
    /// everything else is infrastructure.
    pub fn is_fail_open(&self) -> bool {
        !matches!(
            self,
            Self::InvalidContextItem { .. } | Self::Protocol { .. }
        )
    }
}

impl From<io::Error> for RefrainError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for RefrainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Log the error and return a safe default instead of propagating.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the refrain CLI.
pub mod exit_codes {
    /// The command succeeded.
    pub const OK: i32 = 0;

    /// The command ran but reported a failure.
    pub const ERROR: i32 = 1;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = RefrainError::storage(
            "/tmp/state.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/state.json"));
    }

    #[test]
    fn test_invalid_item_error_display() {
        let err = RefrainError::invalid_item("priority 11 is outside 1..=10");
        assert_eq!(
            err.to_string(),
            "invalid context item: priority 11 is outside 1..=10"
        );
    }

    #[test]
    fn test_git_error_display() {
        let err = RefrainError::git("not a git repository");
        assert_eq!(err.to_string(), "git error: not a git repository");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = RefrainError::protocol("unknown op: frobnicate");
        assert_eq!(err.to_string(), "protocol error: unknown op: frobnicate");
    }

    #[test]
    fn test_fail_open_classification() {
        assert!(RefrainError::git("x").is_fail_open());
        assert!(RefrainError::tokenizer("x").is_fail_open());
        assert!(RefrainError::config("x").is_fail_open());
        assert!(RefrainError::serde("x").is_fail_open());
        assert!(!RefrainError::invalid_item("x").is_fail_open());
        assert!(!RefrainError::protocol("x").is_fail_open());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: RefrainError = io_err.into();
        assert!(matches!(err, RefrainError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: RefrainError = json_err.into();
        assert!(matches!(err, RefrainError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(RefrainError::git("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<u64> = Err(RefrainError::git("test"));
        assert_eq!(result.fail_open_with("test context", 42), 42);
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<u64> = Ok(100);
        assert_eq!(result.fail_open_default("test context"), 100);
    }
}
