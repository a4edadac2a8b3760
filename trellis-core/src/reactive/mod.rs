//! Dependency Tracking
//!
//! This module implements the core of the runtime: deps, watchers, and the
//! evaluation context that connects them.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is attached to every observable slot. Reading the slot while a
//! watcher is evaluating subscribes that watcher to the dep; writing the slot
//! notifies every subscriber.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter against its [`Owner`], collects the deps
//! the getter read, and re-runs when any of them notifies. Watchers come in
//! three flavours: lazy (derived values, recomputed on demand), sync (re-run
//! inline with the notification) and batched (queued on the owner's
//! scheduler).
//!
//! ## Reactive context
//!
//! [`ReactiveContext`] is a thread-local stack naming the watcher that is
//! evaluating right now. Evaluations nest: a watcher that reads a lazy
//! watcher's value evaluates it on top of itself and becomes current again
//! once that returns.
//!
//! # Implementation Notes
//!
//! Each evaluation diffs the deps it read against those of the previous
//! evaluation, subscribing to new ones and unsubscribing from stale ones, so
//! a watcher is subscribed to exactly the deps its last evaluation touched.

mod context;
mod dep;
mod owner;
mod subscriber;
mod watcher;

pub use context::{untracked, ReactiveContext};
pub use dep::{Dep, DepId};
pub use owner::{Owner, OwnerBuilder};
pub use subscriber::{Subscriber, WatcherId};
pub use watcher::{Callback, Expression, Getter, Watcher, WatcherOptions};
