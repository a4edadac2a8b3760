//! Trellis Core
//!
//! This crate provides the dependency-tracking runtime for the Trellis
//! reactive framework. It implements:
//!
//! - Observable data (objects and arrays with a dep per slot)
//! - Watchers that record what they read and re-run when it changes
//! - Lazy derived values with dependency forwarding
//! - A batched, id-ordered flush queue for scheduled watchers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: The [`Value`] model and the observable containers
//! - `reactive`: Deps, watchers, the tracking context and owners
//! - `scheduler`: The [`Scheduler`] boundary and the default [`FlushQueue`]
//! - `config`: Per-thread runtime settings
//! - `error`: [`WatchError`] and the [`ErrorSink`] user faults go to
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::{FlushQueue, Object, Owner};
//!
//! let queue = Arc::new(FlushQueue::new());
//! let data = Object::from_entries([("count", 1)]);
//! let owner = Owner::builder()
//!     .data(data.clone())
//!     .scheduler(queue.clone())
//!     .build();
//!
//! owner
//!     .watch("count", |_, new, old| {
//!         println!("count: {:?} -> {:?}", old, new);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! data.set("count", 2).unwrap();
//! data.set("count", 3).unwrap();
//!
//! // Both writes are batched into one run that sees 1 -> 3.
//! queue.flush().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod observe;
pub mod reactive;
pub mod scheduler;

pub use config::Config;
pub use error::{ErrorSink, Result, TracingErrorSink, WatchError};
pub use observe::{Array, Object, Value};
pub use reactive::{
    untracked, Dep, DepId, Expression, Owner, ReactiveContext, Subscriber, Watcher, WatcherId,
    WatcherOptions,
};
pub use scheduler::{FlushQueue, Scheduler};
