//! Observable arrays.
//!
//! An array has a single [`Dep`] covering its length and every element.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Value;
use crate::error::Result;
use crate::reactive::{Dep, DepId};

struct ArrayInner {
    dep: Dep,
    items: RwLock<Vec<Value>>,
}

/// A growable observable list.
///
/// Cloning an `Array` yields another handle to the same array.
#[derive(Clone)]
pub struct Array {
    inner: Arc<ArrayInner>,
}

impl Array {
    pub fn new() -> Self {
        Self::from_values(Vec::<Value>::new())
    }

    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            inner: Arc::new(ArrayInner {
                dep: Dep::new(),
                items: RwLock::new(values.into_iter().map(Into::into).collect()),
            }),
        }
    }

    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    pub fn id(&self) -> DepId {
        self.inner.dep.id()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.dep.depend();
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read element `index`; out of range reads as `Undefined`.
    pub fn get(&self, index: usize) -> Value {
        self.inner.dep.depend();
        let value = self
            .inner
            .items
            .read()
            .get(index)
            .cloned()
            .unwrap_or_default();
        if let Some(child) = value.child_dep() {
            child.depend();
        }
        value
    }

    /// All elements, tracking the array and each composite element's shape.
    pub fn items(&self) -> Vec<Value> {
        self.inner.dep.depend();
        let items = self.inner.items.read().clone();
        for item in &items {
            if let Some(child) = item.child_dep() {
                child.depend();
            }
        }
        items
    }

    pub fn items_untracked(&self) -> Vec<Value> {
        self.inner.items.read().clone()
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        self.inner.items.write().push(value.into());
        self.inner.dep.notify()
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        let popped = self.inner.items.write().pop();
        if popped.is_some() {
            self.inner.dep.notify()?;
        }
        Ok(popped)
    }

    /// Write element `index`, padding with `Undefined` when it lies past the
    /// end. Writing an unchanged value notifies nobody.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        {
            let mut items = self.inner.items.write();
            if let Some(slot) = items.get_mut(index) {
                if slot.same_value(&value) {
                    return Ok(());
                }
                *slot = value;
            } else {
                items.resize(index, Value::Undefined);
                items.push(value);
            }
        }
        self.inner.dep.notify()
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.id())
            .field("len", &self.inner.items.read().len())
            .finish()
    }
}
