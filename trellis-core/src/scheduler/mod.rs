//! Update Scheduling
//!
//! Batched watchers do not re-run when notified; they hand themselves to
//! their owner's [`Scheduler`], which decides when to run them.
//!
//! # Contract
//!
//! An implementation must:
//!
//! 1. Deduplicate by watcher id: a watcher enqueued several times before it
//!    runs runs once.
//! 2. Run the watchers of one flush in ascending id order, so parents (which
//!    are created first) run before their children.
//! 3. Skip watchers that were torn down after being enqueued.
//!
//! [`FlushQueue`] is the implementation used by default: the embedder calls
//! [`FlushQueue::flush`] at whatever point suits its event loop.

mod queue;

pub use queue::FlushQueue;

use crate::error::Result;
use crate::reactive::Watcher;

/// Receives batched watchers that need to re-run.
pub trait Scheduler: Send + Sync {
    /// Queue `watcher` for the next flush.
    ///
    /// Errors can only come from a synchronous flush triggered by the
    /// enqueue itself.
    fn enqueue(&self, watcher: Watcher) -> Result<()>;
}
