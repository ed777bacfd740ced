//! Serve command for refrain.
//!
//! Runs the NDJSON request loop on stdin/stdout with a background git
//! refresh, until stdin closes.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GitConfig;
use crate::error::Result;
use crate::server::{serve, RefreshTicker};
use crate::service::ContextService;

/// The serve command implementation.
pub struct ServeCommand {
    service: Arc<ContextService>,
}

impl ServeCommand {
    pub fn new(service: Arc<ContextService>) -> Self {
        Self { service }
    }

    /// Serve stdin/stdout. Returns the number of requests answered.
    pub fn run(&self) -> Result<usize> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    /// Serve the given streams.
    pub fn run_with<R: BufRead, W: Write>(&self, reader: R, writer: W) -> Result<usize> {
        let ticker = self.start_ticker()?;

        // Surface the current git state before the first request
        if ticker.is_some() {
            self.service.force_refresh();
        }

        let result = serve(&self.service, reader, writer);

        if let Some(ticker) = ticker {
            let ticks = ticker.stop();
            tracing::debug!(ticks, "git refresh stopped");
        }
        result
    }

    fn start_ticker(&self) -> Result<Option<RefreshTicker>> {
        let git = &self.service.config().git;
        if !git.enabled {
            return Ok(None);
        }
        let seconds = if GitConfig::is_valid_refresh_interval(git.refresh_interval_seconds) {
            git.refresh_interval_seconds
        } else {
            GitConfig::default().refresh_interval_seconds
        };
        RefreshTicker::start(self.service.clone(), Duration::from_secs(seconds)).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::tests::FakeGit;
    use crate::git::{GitStatusProvider, GIT_STATUS_ITEM_ID};
    use crate::storage::{MemoryStateStore, StateStore};
    use crate::tokens::HeuristicCounter;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_serve_until_eof() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let service = Arc::new(ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            Some(Arc::new(FakeGit::on_branch("main")) as Arc<dyn GitStatusProvider>),
            Some(state.clone() as Arc<dyn StateStore>),
        ));

        let input = r#"{"id":1,"op":"track_tokens","params":{"text":"abcd"}}
{"id":2,"op":"get_item","params":{"id":"git_status"}}
"#;
        let mut out = Vec::new();
        let handled = ServeCommand::new(service.clone())
            .run_with(Cursor::new(input.as_bytes().to_vec()), &mut out)
            .unwrap();

        assert_eq!(handled, 2);
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"ok\":true"));
        assert!(service.get_item(GIT_STATUS_ITEM_ID).is_some());
        assert_eq!(state.load().unwrap().unwrap().token_count, 1);
    }

    #[test]
    fn test_serve_without_git() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.git.enabled = false;
        let service = Arc::new(ContextService::with_parts(
            dir.path(),
            config,
            Arc::new(HeuristicCounter),
            None,
            None,
        ));

        let mut out = Vec::new();
        let handled = ServeCommand::new(service)
            .run_with(Cursor::new(b"{\"op\":\"summary\"}\n".to_vec()), &mut out)
            .unwrap();
        assert_eq!(handled, 1);
    }
}
