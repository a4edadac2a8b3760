//! Flush Queue
//!
//! Collects batched watchers and runs them on [`FlushQueue::flush`].
//!
//! # Algorithm
//!
//! 1. `enqueue` records the watcher id; ids already queued are ignored.
//! 2. `flush` sorts the queue by id and walks it front to back, calling the
//!    `before` hook and then `run` on every watcher that is still active.
//! 3. A watcher enqueued while the flush is running is inserted after the
//!    current position at its id-ordered slot, so it still runs in this
//!    flush and order is preserved.
//! 4. A watcher that re-queues itself more than `max_update_count` times in
//!    one flush aborts the flush: its updates would never settle.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::Scheduler;
use crate::config;
use crate::error::{Result, WatchError};
use crate::reactive::{Watcher, WatcherId};

#[derive(Default)]
struct QueueState {
    queue: Vec<Watcher>,
    /// Ids queued and not yet run in this cycle.
    has: HashSet<WatcherId>,
    /// Re-queue counts per watcher for loop detection.
    circular: HashMap<WatcherId, usize>,
    flushing: bool,
    /// Position of the watcher being run.
    index: usize,
}

/// The default [`Scheduler`]: a deduplicated, id-ordered queue flushed on
/// demand.
#[derive(Default)]
pub struct FlushQueue {
    state: Mutex<QueueState>,
}

impl FlushQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued watcher. Returns how many ran.
    ///
    /// A fault from an internal watcher stops the flush, drops whatever is
    /// still queued and is returned. Calling `flush` from inside a running
    /// flush is a no-op.
    pub fn flush(&self) -> Result<usize> {
        let max_update_count = config::current().max_update_count;

        {
            let mut state = self.state.lock();
            if state.flushing {
                return Ok(0);
            }
            state.flushing = true;
            state.index = 0;
            state.queue.sort_by_key(|w| w.id());
            tracing::debug!(queued = state.queue.len(), "flush start");
        }

        let mut ran = 0;
        loop {
            let watcher = {
                let state = self.state.lock();
                match state.queue.get(state.index) {
                    Some(watcher) => watcher.clone(),
                    None => break,
                }
            };
            let id = watcher.id();

            self.state.lock().has.remove(&id);
            if watcher.is_active() {
                watcher.before();
                if let Err(error) = watcher.run() {
                    self.reset();
                    return Err(error);
                }
                ran += 1;
            }

            let mut state = self.state.lock();
            if state.has.contains(&id) {
                let count = {
                    let count = state.circular.entry(id).or_insert(0);
                    *count += 1;
                    *count
                };
                if count > max_update_count {
                    drop(state);
                    tracing::warn!(
                        watcher = id.raw(),
                        expression = watcher.expression(),
                        "you may have an infinite update loop"
                    );
                    self.reset();
                    return Err(WatchError::InfiniteUpdateLoop {
                        watcher: id,
                        expression: watcher.expression().to_string(),
                    });
                }
            }
            state.index += 1;
        }

        self.reset();
        tracing::debug!(ran, "flush done");
        Ok(ran)
    }

    fn reset(&self) {
        *self.state.lock() = QueueState::default();
    }

    /// Ids still waiting to run, in the order they will run.
    pub fn pending(&self) -> Vec<WatcherId> {
        let state = self.state.lock();
        let start = if state.flushing { state.index + 1 } else { 0 };
        let mut ids: Vec<WatcherId> = state
            .queue
            .iter()
            .skip(start)
            .map(Watcher::id)
            .collect();
        if !state.flushing {
            ids.sort();
        }
        ids
    }

    pub fn is_flushing(&self) -> bool {
        self.state.lock().flushing
    }
}

impl Scheduler for FlushQueue {
    fn enqueue(&self, watcher: Watcher) -> Result<()> {
        let flush_now = {
            let mut state = self.state.lock();
            let id = watcher.id();
            if !state.has.insert(id) {
                return Ok(());
            }

            if state.flushing {
                let mut slot = state.queue.len();
                while slot > state.index + 1 && state.queue[slot - 1].id() > id {
                    slot -= 1;
                }
                state.queue.insert(slot, watcher);
            } else {
                state.queue.push(watcher);
            }

            !state.flushing && !config::async_updates()
        };

        if flush_now {
            self.flush()?;
        }
        Ok(())
    }
}
