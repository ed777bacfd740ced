//! Long-lived `refrain serve` process.
//!
//! One [`ContextService`](crate::service::ContextService) lives for the whole
//! process. Requests arrive as NDJSON on stdin and responses leave on stdout;
//! a background [`RefreshTicker`] keeps the git status item current.

pub mod protocol;
pub mod runner;
pub mod ticker;

pub use protocol::{Request, Response};
pub use runner::{dispatch, serve, MAX_LINE_SIZE};
pub use ticker::RefreshTicker;
