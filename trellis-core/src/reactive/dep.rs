//! Dep Implementation
//!
//! A `Dep` is the observable half of the dependency graph. Every reactive
//! slot (an object field, an object's key set, an array) owns one, and every
//! watcher that read the slot during its last evaluation is subscribed to it.
//!
//! # How Deps Work
//!
//! 1. When a slot is read inside an evaluating watcher, the slot calls
//!    [`Dep::depend`], which hands the dep to the current watcher.
//!
//! 2. The watcher decides whether the dep is new for this evaluation and, if
//!    it is not already subscribed, calls [`Dep::add_sub`].
//!
//! 3. When the slot is written, [`Dep::notify`] broadcasts to a snapshot of
//!    the subscribers.
//!
//! # Memory Layout
//!
//! Subscribers are held weakly. Watchers own their deps, deps only point
//! back, so there is no reference cycle and a dropped watcher simply vanishes
//! from the list on the next notify.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, WatcherId};
use crate::config;
use crate::error::Result;

/// Unique identifier for a dep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct SubEntry {
    id: WatcherId,
    sub: Weak<dyn Subscriber>,
}

struct DepInner {
    id: DepId,
    subs: Mutex<Vec<SubEntry>>,
}

/// An observable that any number of watchers can subscribe to.
///
/// Cloning a `Dep` yields another handle to the same subscriber list.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::next(),
                subs: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Subscribe `sub`. Does nothing if it is already subscribed.
    pub fn add_sub(&self, sub: &Arc<dyn Subscriber>) {
        let id = sub.subscriber_id();
        let mut subs = self.inner.subs.lock();
        if subs.iter().any(|entry| entry.id == id) {
            return;
        }
        subs.push(SubEntry {
            id,
            sub: Arc::downgrade(sub),
        });
    }

    /// Unsubscribe the subscriber with `id`, if present.
    pub fn remove_sub(&self, id: WatcherId) {
        let mut subs = self.inner.subs.lock();
        if let Some(pos) = subs.iter().position(|entry| entry.id == id) {
            subs.remove(pos);
        }
    }

    /// Attribute a read of this dep to the watcher currently evaluating.
    ///
    /// No-op when nothing is collecting dependencies.
    pub fn depend(&self) {
        if let Some(target) = ReactiveContext::current() {
            target.add_dependency(self);
        }
    }

    /// Notify every subscriber that the observed value changed.
    ///
    /// Subscribers are snapshotted first, so subscriptions added or removed
    /// by a re-running watcher take effect on the next notify. Without
    /// batching the snapshot is ordered by watcher id, which puts parents
    /// before children; the flush queue does the same ordering otherwise.
    pub fn notify(&self) -> Result<()> {
        let mut snapshot: Vec<(WatcherId, Arc<dyn Subscriber>)> = {
            let mut subs = self.inner.subs.lock();
            subs.retain(|entry| entry.sub.strong_count() > 0);
            subs.iter()
                .filter_map(|entry| entry.sub.upgrade().map(|sub| (entry.id, sub)))
                .collect()
        };

        if !config::async_updates() {
            snapshot.sort_by_key(|(id, _)| *id);
        }

        tracing::trace!(dep = self.id().raw(), subscribers = snapshot.len(), "notify");

        for (_, sub) in snapshot {
            sub.update()?;
        }
        Ok(())
    }

    /// Ids of the current subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<WatcherId> {
        self.inner
            .subs
            .lock()
            .iter()
            .filter(|entry| entry.sub.strong_count() > 0)
            .map(|entry| entry.id)
            .collect()
    }

    pub fn has_sub(&self, id: WatcherId) -> bool {
        self.inner.subs.lock().iter().any(|entry| entry.id == id)
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subs
            .lock()
            .iter()
            .filter(|entry| entry.sub.strong_count() > 0)
            .count()
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscribers", &self.subscriber_ids())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
