//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a [`Dep`](super::Dep) can notify. In practice
//! that is a [`Watcher`](super::Watcher), but the trait keeps the seam open
//! for tests and for embedders that want raw change notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Unique identifier for a watcher.
///
/// Ids increase strictly with creation order. Notification and flush order
/// rely on this: a watcher created earlier (typically a parent) runs before
/// one created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for WatcherId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The subscriber interface.
///
/// `update` is called by [`Dep::notify`](super::Dep::notify) when a
/// dependency changed. An error aborts the broadcast it came from.
pub trait Subscriber: Send + Sync {
    fn subscriber_id(&self) -> WatcherId;

    fn update(self: Arc<Self>) -> Result<()>;
}
