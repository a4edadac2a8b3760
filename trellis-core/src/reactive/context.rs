//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables automatic dependency tracking: when a [`Dep`](super::Dep)
//! is read, it attributes the read to the current watcher.
//!
//! # Implementation
//!
//! We use a thread-local stack of targets. Evaluating a watcher pushes it,
//! and the returned guard pops it when dropped, so the stack stays balanced
//! on every exit path, including early returns and panics.
//!
//! A frame may also be empty: pushing `None` disables dependency collection
//! for whatever runs inside it. Nested frames restore the outer target when
//! they pop, so a lazy watcher evaluated from inside another watcher's getter
//! hands control back to that watcher.

use std::cell::RefCell;

use super::{Watcher, WatcherId};

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<Watcher>>> = RefCell::new(Vec::new());
}

/// Guard that pops the context when dropped.
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ReactiveContext {
    target: Option<WatcherId>,
}

impl ReactiveContext {
    /// Push `target` as the current watcher.
    ///
    /// While the guard is alive, dependency reads attribute to `target`, or
    /// to nothing when `target` is `None`.
    pub fn enter(target: Option<Watcher>) -> Self {
        let id = target.as_ref().map(Watcher::id);
        TARGET_STACK.with(|stack| stack.borrow_mut().push(target));
        tracing::trace!(target_watcher = ?id, "enter reactive context");
        Self { target: id }
    }

    /// Push an empty frame, disabling dependency collection.
    pub fn untracked() -> Self {
        Self::enter(None)
    }

    /// The watcher currently collecting dependencies, if any.
    pub fn current() -> Option<Watcher> {
        TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Get the current watcher ID, if any.
    pub fn current_subscriber() -> Option<WatcherId> {
        TARGET_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.as_ref().map(Watcher::id))
        })
    }

    /// Whether reads right now would be recorded as dependencies.
    pub fn is_tracking() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        TARGET_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Release the borrow before the popped watcher handle is dropped.
        let popped = TARGET_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = popped {
            let popped_id = entry.as_ref().map(Watcher::id);
            debug_assert_eq!(
                popped_id, self.target,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.target, popped_id
            );
        }
    }
}

/// Run `f` without recording any dependency reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::Value;
    use crate::reactive::{Owner, Watcher};

    fn computed(owner: &Owner) -> Watcher {
        Watcher::computed(owner, |_| Ok(Value::Undefined)).unwrap()
    }

    #[test]
    fn context_tracks_watcher() {
        let owner = Owner::builder().build();
        let watcher = computed(&owner);

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(Some(watcher.clone()));

            assert!(ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::current_subscriber(), Some(watcher.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_tracking());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn empty_frame_disables_tracking() {
        let owner = Owner::builder().build();
        let watcher = computed(&owner);

        let _outer = ReactiveContext::enter(Some(watcher.clone()));
        untracked(|| {
            assert!(!ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::depth(), 2);
        });
        assert_eq!(ReactiveContext::current_subscriber(), Some(watcher.id()));
    }

    #[test]
    fn nested_contexts() {
        let owner = Owner::builder().build();
        let outer = computed(&owner);
        let inner = computed(&owner);

        {
            let _ctx1 = ReactiveContext::enter(Some(outer.clone()));
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(Some(inner.clone()));
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_pops_on_panic() {
        let owner = Owner::builder().build();
        let watcher = computed(&owner);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(Some(watcher.clone()));
            panic!("getter blew up");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
