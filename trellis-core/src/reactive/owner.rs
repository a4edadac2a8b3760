//! Watcher Owner
//!
//! An owner is the entity watchers evaluate against. It carries the root
//! data object that path expressions resolve from, keeps the list of
//! watchers created for it, and supplies the collaborators watchers need
//! at runtime: the scheduler for batched updates and the error sink for
//! user faults.
//!
//! # Ownership
//!
//! The owner holds its watchers strongly and each watcher holds the owner
//! weakly. Destroying the owner, or dropping its last handle, tears down
//! every watcher it still owns.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::subscriber::WatcherId;
use super::watcher::{Expression, Watcher, WatcherOptions};
use crate::error::{ErrorSink, Result, TracingErrorSink, WatchError};
use crate::observe::{Object, Value};
use crate::scheduler::{FlushQueue, Scheduler};

struct OwnerInner {
    name: String,
    data: Object,
    watchers: Mutex<Vec<Watcher>>,
    being_destroyed: AtomicBool,
    scheduler: Arc<dyn Scheduler>,
    error_sink: Arc<dyn ErrorSink>,
}

impl OwnerInner {
    fn teardown_watchers(&self) {
        self.being_destroyed.store(true, Ordering::SeqCst);
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in &watchers {
            watcher.teardown();
        }
    }
}

impl Drop for OwnerInner {
    fn drop(&mut self) {
        self.teardown_watchers();
    }
}

/// Handle to an owning context. Clones share the same owner.
#[derive(Clone)]
pub struct Owner {
    inner: Arc<OwnerInner>,
}

/// Non-owning handle held by watchers.
#[derive(Clone)]
pub(crate) struct WeakOwner(Weak<OwnerInner>);

impl WeakOwner {
    pub(crate) fn upgrade(&self) -> Option<Owner> {
        self.0.upgrade().map(|inner| Owner { inner })
    }
}

impl Owner {
    pub fn builder() -> OwnerBuilder {
        OwnerBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Root object that path expressions start from.
    pub fn data(&self) -> &Object {
        &self.inner.data
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    pub(crate) fn downgrade(&self) -> WeakOwner {
        WeakOwner(Arc::downgrade(&self.inner))
    }

    /// Watch `expression` with user-level fault handling: getter and
    /// callback errors go to the error sink instead of the caller.
    pub fn watch<C>(&self, expression: impl Into<Expression>, callback: C) -> Result<Watcher>
    where
        C: Fn(&Owner, &Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.watch_with(expression, callback, WatcherOptions::default())
    }

    /// Like [`Owner::watch`] with extra options; `user` is always set.
    pub fn watch_with<C>(
        &self,
        expression: impl Into<Expression>,
        callback: C,
        options: WatcherOptions,
    ) -> Result<Watcher>
    where
        C: Fn(&Owner, &Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        Watcher::new(self, expression, callback, options.user())
    }

    /// Tear down every watcher and stop tracking them. Idempotent.
    pub fn destroy(&self) {
        if self.is_being_destroyed() {
            return;
        }
        tracing::debug!(owner = %self.inner.name, watchers = self.watcher_count(), "destroying owner");
        self.inner.teardown_watchers();
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.inner.being_destroyed.load(Ordering::SeqCst)
    }

    /// Forward a user fault to the error sink.
    pub fn report_error(&self, error: &WatchError, info: &str) {
        self.inner.error_sink.report(error, self, info);
    }

    pub(crate) fn add_watcher(&self, watcher: Watcher) {
        self.inner.watchers.lock().push(watcher);
    }

    pub(crate) fn remove_watcher(&self, id: WatcherId) {
        // Take the handle out under the lock, drop it after.
        let removed = {
            let mut watchers = self.inner.watchers.lock();
            watchers
                .iter()
                .position(|w| w.id() == id)
                .map(|pos| watchers.remove(pos))
        };
        drop(removed);
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }

    /// Ids of the owned watchers, in creation order.
    pub fn watcher_ids(&self) -> Vec<WatcherId> {
        self.inner.watchers.lock().iter().map(Watcher::id).collect()
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.inner.name)
            .field("watchers", &self.watcher_ids())
            .field("being_destroyed", &self.is_being_destroyed())
            .finish()
    }
}

/// Builder for [`Owner`].
///
/// Defaults: name `"anonymous"`, an empty data object, a fresh
/// [`FlushQueue`] and a [`TracingErrorSink`].
#[derive(Default)]
pub struct OwnerBuilder {
    name: Option<String>,
    data: Option<Object>,
    scheduler: Option<Arc<dyn Scheduler>>,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl OwnerBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn data(mut self, data: Object) -> Self {
        self.data = Some(data);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(error_sink);
        self
    }

    pub fn build(self) -> Owner {
        Owner {
            inner: Arc::new(OwnerInner {
                name: self.name.unwrap_or_else(|| "anonymous".to_string()),
                data: self.data.unwrap_or_default(),
                watchers: Mutex::new(Vec::new()),
                being_destroyed: AtomicBool::new(false),
                scheduler: self
                    .scheduler
                    .unwrap_or_else(|| Arc::new(FlushQueue::new())),
                error_sink: self
                    .error_sink
                    .unwrap_or_else(|| Arc::new(TracingErrorSink)),
            }),
        }
    }
}
