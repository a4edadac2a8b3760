//! Error types and the error reporting boundary.
//!
//! Faults raised by a watcher's getter or callback travel one of two ways:
//!
//! - For user watchers they are handed to the owner's [`ErrorSink`] and the
//!   runtime keeps going.
//! - For internal watchers they are returned to the caller as a
//!   [`WatchError`] and terminate the enclosing operation.

use thiserror::Error;

use crate::reactive::{Owner, WatcherId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors produced while evaluating watchers or flushing the update queue.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A getter or callback failed.
    #[error("{message}")]
    Thrown { message: String },

    /// The watcher outlived the owner it evaluates against.
    #[error("owner of watcher {watcher:?} has been dropped")]
    OwnerDropped { watcher: WatcherId },

    /// A watcher kept re-queueing itself during a single flush.
    #[error("infinite update loop in watcher {watcher:?} with expression \"{expression}\"")]
    InfiniteUpdateLoop {
        watcher: WatcherId,
        expression: String,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl WatchError {
    /// Build a [`WatchError::Thrown`] from any message.
    ///
    /// Getters and callbacks use this to signal failure.
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown {
            message: message.into(),
        }
    }
}

/// Receives faults from user watchers.
///
/// Implementations must not fail; whatever they do with the error, the
/// runtime continues processing other watchers afterwards.
pub trait ErrorSink: Send + Sync {
    /// Report `error` raised in `owner`. `info` describes where it happened,
    /// e.g. `getter for watcher "a.b"`.
    fn report(&self, error: &WatchError, owner: &Owner, info: &str);
}

/// Default sink: logs the fault through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &WatchError, owner: &Owner, info: &str) {
        tracing::error!(owner = owner.name(), info, %error, "error in watcher");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thrown_displays_message() {
        let err = WatchError::thrown("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn infinite_loop_mentions_expression() {
        let err = WatchError::InfiniteUpdateLoop {
            watcher: WatcherId::from(7),
            expression: "count".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("\"count\""));
        assert!(text.contains('7'));
    }

    #[test]
    fn config_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: WatchError = parse.into();
        assert!(matches!(err, WatchError::Config(_)));
    }
}
