//! Watcher Implementation
//!
//! A watcher evaluates an expression against its [`Owner`], records every
//! [`Dep`] the expression read, and reacts when one of them notifies.
//!
//! # How Watchers Work
//!
//! 1. Evaluation pushes the watcher onto the reactive context stack and runs
//!    the getter. Each dep read during the getter lands in the watcher's
//!    pending generation; deps seen for the first time get a subscription.
//!
//! 2. After the getter returns (or fails), the watcher pops itself and diffs
//!    the generations: deps from the previous evaluation that were not read
//!    this time are unsubscribed, then the generations swap.
//!
//! 3. On notification the watcher reacts per its mode:
//!    - lazy: mark dirty, recompute when someone asks for the value
//!    - sync: run right away, inside the notify call
//!    - otherwise: hand itself to the owner's scheduler
//!
//! 4. `run` re-evaluates and calls the callback when the value changed. A
//!    composite value, or any value of a deep watcher, always counts as
//!    changed because it may have been mutated in place.
//!
//! # Errors
//!
//! User watchers report getter and callback faults to the owner's error sink
//! and keep going. Internal watchers return them to the caller.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::owner::{Owner, WeakOwner};
use super::subscriber::{Subscriber, WatcherId};
use crate::error::{Result, WatchError};
use crate::observe::{parse_path, traverse, Value};

/// Computes a watcher's value.
pub type Getter = Arc<dyn Fn(&Owner) -> Result<Value> + Send + Sync>;

/// Called with `(new, old)` when a re-run detects a change.
pub type Callback = Arc<dyn Fn(&Owner, &Value, &Value) -> Result<()> + Send + Sync>;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// What a watcher evaluates.
#[derive(Clone)]
pub enum Expression {
    /// An arbitrary function of the owner.
    Getter(Getter),
    /// A dot-delimited path into the owner's data, e.g. `"user.name"`.
    Path(String),
}

impl Expression {
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn(&Owner) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Getter(Arc::new(getter))
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }
}

impl From<&str> for Expression {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Expression {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter(_) => f.write_str("Getter(..)"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// Mode flags for a watcher.
#[derive(Clone, Default)]
pub struct WatcherOptions {
    /// Traverse the value so nested fields are tracked, and always fire.
    pub deep: bool,
    /// User-supplied logic: faults are reported instead of returned.
    pub user: bool,
    /// Only evaluate on demand; notifications just mark the watcher dirty.
    pub lazy: bool,
    /// Run inline on notification instead of going through the scheduler.
    pub sync: bool,
    /// Invoked by the flush queue right before a scheduled run.
    pub before: Option<Hook>,
}

impl WatcherOptions {
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn user(mut self) -> Self {
        self.user = true;
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for WatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherOptions")
            .field("deep", &self.deep)
            .field("user", &self.user)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("before", &self.before.is_some())
            .finish()
    }
}

/// One generation of dependencies, with an id set for O(1) membership.
#[derive(Default)]
struct DepSet {
    deps: SmallVec<[Dep; 4]>,
    ids: HashSet<DepId>,
}

impl DepSet {
    fn contains(&self, id: DepId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns false if the dep was already present.
    fn insert(&mut self, dep: &Dep) -> bool {
        if !self.ids.insert(dep.id()) {
            return false;
        }
        self.deps.push(dep.clone());
        true
    }

    fn clear(&mut self) {
        self.deps.clear();
        self.ids.clear();
    }
}

struct WatcherState {
    value: Value,
    dirty: bool,
    /// Deps confirmed by the last completed evaluation.
    current: DepSet,
    /// Deps read by the evaluation in progress.
    pending: DepSet,
}

pub(crate) struct WatcherInner {
    id: WatcherId,
    expression: String,
    getter: Getter,
    callback: Callback,
    options: WatcherOptions,
    owner: WeakOwner,
    active: AtomicBool,
    state: Mutex<WatcherState>,
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> WatcherId {
        self.id
    }

    fn update(self: Arc<Self>) -> Result<()> {
        Watcher { inner: self }.update()
    }
}

/// An observer that re-runs when the deps it read change.
///
/// Cloning a `Watcher` creates another handle to the same watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

/// Pops the context frame and diffs dependency generations on drop, so both
/// happen on every exit path out of an evaluation.
struct Collecting<'a> {
    watcher: &'a Watcher,
    frame: Option<ReactiveContext>,
}

impl<'a> Collecting<'a> {
    fn begin(watcher: &'a Watcher) -> Self {
        Self {
            watcher,
            frame: Some(ReactiveContext::enter(Some(watcher.clone()))),
        }
    }
}

impl Drop for Collecting<'_> {
    fn drop(&mut self) {
        drop(self.frame.take());
        self.watcher.cleanup_dependencies();
    }
}

impl Watcher {
    /// Create a watcher and register it with `owner`.
    ///
    /// Unless the watcher is lazy, it evaluates once right away to capture
    /// its baseline value and subscriptions. A path that does not parse
    /// produces a watcher that always evaluates to `Undefined`.
    pub fn new<C>(
        owner: &Owner,
        expression: impl Into<Expression>,
        callback: C,
        options: WatcherOptions,
    ) -> Result<Self>
    where
        C: Fn(&Owner, &Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        let (getter, expression) = match expression.into() {
            Expression::Getter(getter) => (getter, "<function>".to_string()),
            Expression::Path(path) => {
                let getter = parse_path(&path).unwrap_or_else(|| {
                    tracing::warn!(
                        path = %path,
                        "failed watching path: only simple dot-delimited paths are accepted, use a getter function for full control"
                    );
                    let noop: Getter = Arc::new(|_: &Owner| Ok(Value::Undefined));
                    noop
                });
                (getter, path)
            }
        };

        let watcher = Self {
            inner: Arc::new(WatcherInner {
                id: WatcherId::new(),
                expression,
                getter,
                callback: Arc::new(callback),
                owner: owner.downgrade(),
                active: AtomicBool::new(true),
                state: Mutex::new(WatcherState {
                    value: Value::Undefined,
                    dirty: options.lazy,
                    current: DepSet::default(),
                    pending: DepSet::default(),
                }),
                options,
            }),
        };

        owner.add_watcher(watcher.clone());
        tracing::debug!(
            watcher = watcher.id().raw(),
            expression = %watcher.inner.expression,
            options = ?watcher.inner.options,
            "watcher created"
        );

        if !watcher.inner.options.lazy {
            match watcher.evaluate_with(owner) {
                Ok(Some(value)) => watcher.inner.state.lock().value = value,
                Ok(None) => {}
                Err(error) => {
                    watcher.teardown();
                    return Err(error);
                }
            }
        }

        Ok(watcher)
    }

    /// Create a lazy watcher with no callback: a derived value read through
    /// [`Watcher::computed_value`].
    pub fn computed<F>(owner: &Owner, getter: F) -> Result<Self>
    where
        F: Fn(&Owner) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(
            owner,
            Expression::getter(getter),
            |_, _, _| Ok(()),
            WatcherOptions::default().lazy(),
        )
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Whether a lazy watcher's cached value is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    pub fn is_sync(&self) -> bool {
        self.inner.options.sync
    }

    pub fn is_deep(&self) -> bool {
        self.inner.options.deep
    }

    pub fn is_user(&self) -> bool {
        self.inner.options.user
    }

    /// The last value stored by construction, `run` or `recompute`.
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    /// Ids of the deps confirmed by the last completed evaluation.
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.inner
            .state
            .lock()
            .current
            .deps
            .iter()
            .map(Dep::id)
            .collect()
    }

    pub fn dep_count(&self) -> usize {
        self.inner.state.lock().current.deps.len()
    }

    fn owner(&self) -> Result<Owner> {
        self.inner
            .owner
            .upgrade()
            .ok_or(WatchError::OwnerDropped { watcher: self.id() })
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// Returns the fresh value. After a reported fault (user watchers only)
    /// the cached value is returned instead. The cached value itself is not
    /// updated; `run` and `recompute` do that.
    pub fn evaluate(&self) -> Result<Value> {
        let owner = self.owner()?;
        match self.evaluate_with(&owner)? {
            Some(value) => Ok(value),
            None => Ok(self.value()),
        }
    }

    /// `Ok(None)` means the getter failed and the fault was reported.
    fn evaluate_with(&self, owner: &Owner) -> Result<Option<Value>> {
        let result = {
            let _collecting = Collecting::begin(self);
            let result = (self.inner.getter)(owner);
            if self.inner.options.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };

        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if self.inner.options.user => {
                let info = format!("getter for watcher \"{}\"", self.inner.expression);
                owner.report_error(&error, &info);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Record `dep` as read by the evaluation in progress.
    ///
    /// Subscribes to `dep` only if the previous evaluation did not already.
    pub fn add_dependency(&self, dep: &Dep) {
        if !self.is_active() {
            return;
        }

        let subscribe = {
            let mut state = self.inner.state.lock();
            if !state.pending.insert(dep) {
                return;
            }
            !state.current.contains(dep.id())
        };

        if subscribe {
            tracing::trace!(watcher = self.id().raw(), dep = dep.id().raw(), "subscribe");
            let me: Arc<dyn Subscriber> = self.inner.clone();
            dep.add_sub(&me);
        }
    }

    /// Drop subscriptions the last evaluation no longer needed and promote
    /// the pending generation to current.
    fn cleanup_dependencies(&self) {
        let stale: SmallVec<[Dep; 4]> = {
            let mut state = self.inner.state.lock();
            let WatcherState {
                current, pending, ..
            } = &mut *state;

            let stale = current
                .deps
                .iter()
                .filter(|dep| !pending.contains(dep.id()))
                .cloned()
                .collect();

            std::mem::swap(current, pending);
            pending.clear();
            stale
        };

        for dep in stale {
            tracing::trace!(watcher = self.id().raw(), dep = dep.id().raw(), "unsubscribe");
            dep.remove_sub(self.id());
        }
    }

    /// React to a dependency change.
    pub fn update(&self) -> Result<()> {
        if self.inner.options.lazy {
            self.inner.state.lock().dirty = true;
            Ok(())
        } else if self.inner.options.sync {
            self.run()
        } else {
            match self.inner.owner.upgrade() {
                Some(owner) => owner.scheduler().enqueue(self.clone()),
                None => {
                    tracing::debug!(watcher = self.id().raw(), "owner dropped, update skipped");
                    Ok(())
                }
            }
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Called by the scheduler for batched watchers and directly for sync
    /// ones. Does nothing once the watcher is torn down.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }

        let owner = self.owner()?;
        // A reported getter fault leaves the cached value in place; composite
        // and deep watchers still count that as a change.
        let value = match self.evaluate_with(&owner)? {
            Some(value) => value,
            None => self.value(),
        };

        let old = {
            let mut state = self.inner.state.lock();
            let changed = !value.strict_eq(&state.value)
                || value.is_composite()
                || self.inner.options.deep;
            if !changed {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        let result = (self.inner.callback)(&owner, &value, &old);
        match result {
            Err(error) if self.inner.options.user => {
                let info = format!("callback for watcher \"{}\"", self.inner.expression);
                owner.report_error(&error, &info);
                Ok(())
            }
            other => other,
        }
    }

    /// Evaluate, store the value and clear the dirty flag.
    ///
    /// Used by lazy watchers when their value is needed.
    pub fn recompute(&self) -> Result<()> {
        let owner = self.owner()?;
        let value = self.evaluate_with(&owner)?;

        let mut state = self.inner.state.lock();
        if let Some(value) = value {
            state.value = value;
        }
        state.dirty = false;
        Ok(())
    }

    /// Read a lazy watcher's value the way a consumer should: recompute if
    /// dirty, then forward this watcher's deps to whichever watcher is
    /// evaluating, so the consumer re-runs when they change.
    pub fn computed_value(&self) -> Result<Value> {
        if self.is_dirty() {
            self.recompute()?;
        }
        if ReactiveContext::is_tracking() {
            self.depend();
        }
        Ok(self.value())
    }

    /// Make the current target depend on every dep this watcher depends on.
    pub fn depend(&self) {
        let deps = self.inner.state.lock().current.deps.clone();
        for dep in deps.iter() {
            dep.depend();
        }
    }

    /// Call the `before` hook, if any.
    pub fn before(&self) {
        if let Some(hook) = &self.inner.options.before {
            hook();
        }
    }

    /// Unsubscribe from everything and deactivate. Safe to call repeatedly.
    pub fn teardown(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        // Removing from the owner's list is skipped while the owner is
        // tearing everything down anyway.
        if let Some(owner) = self.inner.owner.upgrade() {
            if !owner.is_being_destroyed() {
                owner.remove_watcher(self.id());
            }
        }

        // Torn down mid-evaluation, the pending generation may hold fresh
        // subscriptions too.
        let (current, pending) = {
            let mut state = self.inner.state.lock();
            (
                std::mem::take(&mut state.current),
                std::mem::take(&mut state.pending),
            )
        };
        for dep in current.deps.iter().chain(pending.deps.iter()) {
            dep.remove_sub(self.id());
        }

        tracing::debug!(watcher = self.id().raw(), "watcher torn down");
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("options", &self.inner.options)
            .field("active", &self.is_active())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    use crate::observe::Object;

    fn owner_with(data: Object) -> Owner {
        Owner::builder().name("test").data(data).build()
    }

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        let clone = count.clone();
        (count, clone)
    }

    #[test]
    fn construction_evaluates_and_subscribes() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());

        let watcher = Watcher::new(&owner, "a", |_, _, _| Ok(()), WatcherOptions::default())
            .unwrap();

        assert_eq!(watcher.value().as_f64(), Some(1.0));
        let dep = data.field_dep("a").unwrap();
        assert_eq!(dep.subscriber_ids(), vec![watcher.id()]);
        assert_eq!(owner.watcher_ids(), vec![watcher.id()]);
    }

    #[test]
    fn lazy_watcher_defers_evaluation() {
        let (calls, calls_clone) = counter();
        let owner = owner_with(Object::new());

        let watcher = Watcher::computed(&owner, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(42))
        })
        .unwrap();

        assert!(watcher.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(watcher.computed_value().unwrap().as_f64(), Some(42.0));
        assert!(!watcher.is_dirty());

        // Clean: served from cache.
        watcher.computed_value().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_watcher_marks_dirty_on_notify() {
        let data = Object::from_entries([("n", 1)]);
        let owner = owner_with(data.clone());

        let reader = data.clone();
        let doubled = Watcher::computed(&owner, move |_| {
            Ok(Value::from(reader.get("n").as_f64().unwrap_or(0.0) * 2.0))
        })
        .unwrap();

        assert_eq!(doubled.computed_value().unwrap().as_f64(), Some(2.0));

        data.set("n", 5).unwrap();
        assert!(doubled.is_dirty());
        assert_eq!(doubled.computed_value().unwrap().as_f64(), Some(10.0));
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                reader.get("a");
                reader.get("a");
                Ok(reader.get("a"))
            }),
            |_, _, _| Ok(()),
            WatcherOptions::default(),
        )
        .unwrap();

        assert_eq!(watcher.dep_count(), 1);
        assert_eq!(data.field_dep("a").unwrap().subscriber_count(), 1);

        watcher.evaluate().unwrap();
        assert_eq!(data.field_dep("a").unwrap().subscriber_count(), 1);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let data = Object::from_entries([("flag", Value::Bool(true))]);
        data.set("left", 1).unwrap();
        data.set("right", 2).unwrap();
        let owner = owner_with(data.clone());

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                if reader.get("flag").as_bool() == Some(true) {
                    Ok(reader.get("left"))
                } else {
                    Ok(reader.get("right"))
                }
            }),
            |_, _, _| Ok(()),
            WatcherOptions::default().sync(),
        )
        .unwrap();

        let left = data.field_dep("left").unwrap();
        let right = data.field_dep("right").unwrap();
        assert!(left.has_sub(watcher.id()));
        assert!(!right.has_sub(watcher.id()));

        data.set("flag", false).unwrap();

        assert!(!left.has_sub(watcher.id()));
        assert!(right.has_sub(watcher.id()));
        assert_eq!(watcher.value().as_f64(), Some(2.0));
    }

    #[test]
    fn run_fires_callback_only_on_change() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let watcher = Watcher::new(
            &owner,
            "a",
            move |_, new, old| {
                seen_clone.lock().push((new.as_f64(), old.as_f64()));
                Ok(())
            },
            WatcherOptions::default().sync(),
        )
        .unwrap();

        data.set("a", 2).unwrap();
        // Unchanged value: no notify at all, and a manual run does not fire.
        data.set("a", 2).unwrap();
        watcher.run().unwrap();

        assert_eq!(*seen.lock(), vec![(Some(2.0), Some(1.0))]);
    }

    #[test]
    fn composite_values_always_fire() {
        let inner = Object::from_entries([("x", 1)]);
        let data = Object::new();
        data.set("inner", inner).unwrap();
        let owner = owner_with(data);
        let (fired, fired_clone) = counter();

        let watcher = Watcher::new(
            &owner,
            "inner",
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            WatcherOptions::default(),
        )
        .unwrap();

        watcher.run().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deep_watcher_tracks_nested_fields() {
        let inner = Object::from_entries([("x", 1)]);
        let data = Object::new();
        data.set("inner", inner.clone()).unwrap();
        let owner = owner_with(data);
        let (fired, fired_clone) = counter();

        let watcher = Watcher::new(
            &owner,
            "inner",
            move |_, new, old| {
                assert!(new.strict_eq(old));
                fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            WatcherOptions::default().deep().sync(),
        )
        .unwrap();

        assert!(inner.field_dep("x").unwrap().has_sub(watcher.id()));

        inner.set("x", 2).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn internal_getter_error_propagates_and_cleans_up() {
        let owner = owner_with(Object::new());
        let result = Watcher::new(
            &owner,
            Expression::getter(|_| Err(WatchError::thrown("broken invariant"))),
            |_, _, _| Ok(()),
            WatcherOptions::default(),
        );

        assert!(matches!(result, Err(WatchError::Thrown { .. })));
        assert_eq!(ReactiveContext::depth(), 0);
        assert_eq!(owner.watcher_count(), 0);
    }

    #[test]
    fn getter_error_still_collects_dependencies() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());
        let fail = Arc::new(AtomicBool::new(false));
        let fail_clone = fail.clone();

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                let value = reader.get("a");
                if fail_clone.load(Ordering::SeqCst) {
                    return Err(WatchError::thrown("nope"));
                }
                Ok(value)
            }),
            |_, _, _| Ok(()),
            WatcherOptions::default(),
        )
        .unwrap();

        fail.store(true, Ordering::SeqCst);
        assert!(watcher.evaluate().is_err());
        assert!(data.field_dep("a").unwrap().has_sub(watcher.id()));
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn invalid_path_yields_undefined() {
        let owner = owner_with(Object::from_entries([("a", 1)]));
        let watcher = Watcher::new(
            &owner,
            "a + 1",
            |_, _, _| Ok(()),
            WatcherOptions::default(),
        )
        .unwrap();

        assert!(watcher.value().is_undefined());
        assert_eq!(watcher.dep_count(), 0);
        assert_eq!(watcher.expression(), "a + 1");
    }

    #[test]
    fn teardown_is_idempotent() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());
        let watcher = Watcher::new(&owner, "a", |_, _, _| Ok(()), WatcherOptions::default())
            .unwrap();

        watcher.teardown();
        watcher.teardown();

        assert!(!watcher.is_active());
        assert_eq!(watcher.dep_count(), 0);
        assert_eq!(data.field_dep("a").unwrap().subscriber_count(), 0);
        assert_eq!(owner.watcher_count(), 0);
    }

    #[test]
    fn run_after_teardown_does_nothing() {
        let (fired, fired_clone) = counter();
        let owner = owner_with(Object::new());
        let watcher = Watcher::new(
            &owner,
            Expression::getter(|_| Ok(Value::Object(Object::new()))),
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            WatcherOptions::default(),
        )
        .unwrap();

        watcher.teardown();
        watcher.run().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn faulting_run_keeps_value_and_fires_deep_watcher() {
        let inner = Object::from_entries([("x", 1)]);
        let data = Object::new();
        data.set("inner", inner.clone()).unwrap();
        let owner = owner_with(data.clone());
        let fail = Arc::new(AtomicBool::new(false));
        let fail_clone = fail.clone();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                let value = reader.get("inner");
                if fail_clone.load(Ordering::SeqCst) {
                    return Err(WatchError::thrown("getter failed"));
                }
                Ok(value)
            }),
            move |_, new, old| {
                calls_clone.lock().push((new.clone(), old.clone()));
                Ok(())
            },
            WatcherOptions::default().deep().user(),
        )
        .unwrap();

        fail.store(true, Ordering::SeqCst);
        watcher.run().unwrap();

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        let (new, old) = &calls[0];
        assert!(new.as_object().is_some_and(|obj| obj.ptr_eq(&inner)));
        assert!(old.as_object().is_some_and(|obj| obj.ptr_eq(&inner)));
        assert!(watcher
            .value()
            .as_object()
            .is_some_and(|obj| obj.ptr_eq(&inner)));
    }

    #[test]
    fn faulting_run_keeps_primitive_value_silently() {
        let data = Object::from_entries([("a", 1)]);
        let owner = owner_with(data.clone());
        let fail = Arc::new(AtomicBool::new(false));
        let fail_clone = fail.clone();
        let (fired, fired_clone) = counter();

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                let value = reader.get("a");
                if fail_clone.load(Ordering::SeqCst) {
                    return Err(WatchError::thrown("getter failed"));
                }
                Ok(value)
            }),
            move |_, _, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            WatcherOptions::default().user(),
        )
        .unwrap();

        fail.store(true, Ordering::SeqCst);
        watcher.run().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(watcher.value().as_f64(), Some(1.0));
    }

    #[test]
    fn teardown_during_evaluation_releases_fresh_subscriptions() {
        let data = Object::from_entries([("b", 1)]);
        let owner = owner_with(data.clone());
        let slot: Arc<Mutex<Option<Watcher>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();

        let reader = data.clone();
        let watcher = Watcher::new(
            &owner,
            Expression::getter(move |_| {
                let value = reader.get("b");
                if let Some(me) = slot_clone.lock().take() {
                    me.teardown();
                }
                Ok(value)
            }),
            |_, _, _| Ok(()),
            WatcherOptions::default().lazy(),
        )
        .unwrap();
        *slot.lock() = Some(watcher.clone());

        watcher.evaluate().unwrap();

        assert!(!watcher.is_active());
        assert!(!data.field_dep("b").unwrap().has_sub(watcher.id()));
        assert_eq!(watcher.dep_count(), 0);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn clone_shares_state() {
        let owner = owner_with(Object::from_entries([("a", 1)]));
        let w1 = Watcher::new(&owner, "a", |_, _, _| Ok(()), WatcherOptions::default())
            .unwrap();
        let w2 = w1.clone();

        assert_eq!(w1.id(), w2.id());
        w1.teardown();
        assert!(!w2.is_active());
    }

    #[test]
    fn evaluating_without_owner_fails() {
        let owner = owner_with(Object::new());
        let watcher = Watcher::computed(&owner, |_| Ok(Value::Null)).unwrap();
        let id = watcher.id();
        drop(owner);

        assert!(!watcher.is_active());
        assert!(matches!(
            watcher.evaluate(),
            Err(WatchError::OwnerDropped { watcher }) if watcher == id
        ));
    }
}
