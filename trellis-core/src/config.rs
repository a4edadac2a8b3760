//! Runtime configuration.
//!
//! The active [`Config`] is thread-local, like the reactive context stack:
//! every thread drives its own dependency graph and may configure it
//! independently.

use std::cell::RefCell;

use serde::Deserialize;

use crate::error::Result;

/// Tunables for notification and flushing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch non-sync watchers through the scheduler.
    ///
    /// When false, `FlushQueue` flushes as soon as something is enqueued and
    /// `Dep::notify` dispatches subscribers in ascending id order itself.
    pub async_updates: bool,

    /// How many times a single watcher may re-queue itself within one flush
    /// before the flush is aborted as an infinite loop.
    pub max_update_count: usize,
}

impl Config {
    pub const DEFAULT_MAX_UPDATE_COUNT: usize = 100;

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_updates: true,
            max_update_count: Self::DEFAULT_MAX_UPDATE_COUNT,
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Config> = RefCell::new(Config::default());
}

/// The config active on this thread.
pub fn current() -> Config {
    ACTIVE.with(|cfg| cfg.borrow().clone())
}

/// Replace the config active on this thread, returning the previous one.
pub fn set(config: Config) -> Config {
    ACTIVE.with(|cfg| cfg.replace(config))
}

/// Run `f` with `config` active, restoring the previous config afterwards
/// (also when `f` panics).
pub fn with_config<R>(config: Config, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Config>);

    impl Drop for Restore {
        fn drop(&mut self) {
            if let Some(previous) = self.0.take() {
                set(previous);
            }
        }
    }

    let _restore = Restore(Some(set(config)));
    f()
}

pub(crate) fn async_updates() -> bool {
    ACTIVE.with(|cfg| cfg.borrow().async_updates)
}
