//! Background git refresh.
//!
//! A dedicated thread wakes every `git.refresh_interval_seconds` and calls
//! [`ContextService::refresh_if_changed`]. Dropping the sender (or calling
//! [`RefreshTicker::stop`]) ends the thread at its next wake-up.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::Result;
use crate::service::ContextService;

/// Handle to the refresh thread.
#[derive(Debug)]
pub struct RefreshTicker {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<usize>>,
}

impl RefreshTicker {
    /// Spawn the refresh thread.
    pub fn start(service: Arc<ContextService>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("refrain-refresh".to_string())
            .spawn(move || {
                let mut ticks = 0;
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            ticks += 1;
                            let outcome = service.refresh_if_changed();
                            tracing::debug!(tick = ticks, outcome = %outcome.message(), "refresh tick");
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                ticks
            })?;

        tracing::info!(interval_secs = interval.as_secs(), "git refresh started");
        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it. Returns the number of ticks run.
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(ticks)) => ticks,
            Some(Err(_)) => {
                tracing::error!("refresh thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::tests::FakeGit;
    use crate::git::{GitStatusProvider, GIT_STATUS_ITEM_ID};
    use crate::tokens::HeuristicCounter;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[test]
    fn test_ticker_refreshes_until_stopped() {
        let dir = TempDir::new().unwrap();
        let git = Arc::new(FakeGit::on_branch("main"));
        let service = Arc::new(ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            Some(git.clone() as Arc<dyn GitStatusProvider>),
            None,
        ));

        let ticker = RefreshTicker::start(service.clone(), Duration::from_millis(10)).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while git.calls.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let ticks = ticker.stop();

        assert!(ticks >= 2);
        assert!(service.get_item(GIT_STATUS_ITEM_ID).is_some());

        // No more calls after stop
        let calls = git.calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(git.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_stop_before_first_tick() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(ContextService::with_parts(
            dir.path(),
            Config::default(),
            Arc::new(HeuristicCounter),
            None,
            None,
        ));
        let ticker = RefreshTicker::start(service, Duration::from_secs(3600)).unwrap();
        assert_eq!(ticker.stop(), 0);
    }
}
