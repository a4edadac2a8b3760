//! Observable objects.
//!
//! Every field owns a [`Dep`], and the object owns one more for its key
//! set. Reads inside an evaluating watcher subscribe it; writes notify.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::Result;
use crate::reactive::{Dep, DepId};

struct Field {
    value: Value,
    dep: Dep,
}

impl Field {
    fn new(value: Value) -> Self {
        Self {
            value,
            dep: Dep::new(),
        }
    }
}

struct ObjectInner {
    /// Notified when a key is added or removed.
    dep: Dep,
    fields: RwLock<IndexMap<String, Field>>,
}

/// A string-keyed, insertion-ordered observable map.
///
/// Cloning an `Object` yields another handle to the same object.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                dep: Dep::new(),
                fields: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Build an object from key/value pairs without notifying anyone.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = entries
            .into_iter()
            .map(|(k, v)| (k.into(), Field::new(v.into())))
            .collect();
        Self {
            inner: Arc::new(ObjectInner {
                dep: Dep::new(),
                fields: RwLock::new(fields),
            }),
        }
    }

    /// The key-set dep.
    pub fn dep(&self) -> &Dep {
        &self.inner.dep
    }

    /// Identity of this object, shared with its key-set dep.
    pub fn id(&self) -> DepId {
        self.inner.dep.id()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read `key`, tracking the field. Missing keys read as `Undefined` and
    /// track the key set instead, so a later insert is observed.
    pub fn get(&self, key: &str) -> Value {
        let found = {
            let fields = self.inner.fields.read();
            fields
                .get(key)
                .map(|field| (field.value.clone(), field.dep.clone()))
        };

        match found {
            Some((value, dep)) => {
                dep.depend();
                if let Some(child) = value.child_dep() {
                    child.depend();
                }
                value
            }
            None => {
                self.inner.dep.depend();
                Value::Undefined
            }
        }
    }

    pub fn get_untracked(&self, key: &str) -> Value {
        self.inner
            .fields
            .read()
            .get(key)
            .map(|field| field.value.clone())
            .unwrap_or_default()
    }

    /// Write `key`. Writing an unchanged value notifies nobody; a new key
    /// notifies the key-set dep.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let dep = {
            let mut fields = self.inner.fields.write();
            match fields.get_mut(&key) {
                Some(field) if field.value.same_value(&value) => return Ok(()),
                Some(field) => {
                    field.value = value;
                    field.dep.clone()
                }
                None => {
                    fields.insert(key, Field::new(value));
                    self.inner.dep.clone()
                }
            }
        };

        dep.notify()
    }

    /// Remove `key`, returning its value (`Undefined` if absent).
    pub fn remove(&self, key: &str) -> Result<Value> {
        let removed = self.inner.fields.write().shift_remove(key);
        match removed {
            Some(field) => {
                self.inner.dep.notify()?;
                Ok(field.value)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Keys in insertion order, tracking the key set.
    pub fn keys(&self) -> Vec<String> {
        self.inner.dep.depend();
        self.inner.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dep attached to `key`, if the key exists.
    pub fn field_dep(&self, key: &str) -> Option<Dep> {
        self.inner
            .fields
            .read()
            .get(key)
            .map(|field| field.dep.clone())
    }

    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.inner
            .fields
            .read()
            .iter()
            .map(|(k, field)| (k.clone(), field.value.clone()))
            .collect()
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.inner.fields.read().keys().cloned().collect();
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("keys", &keys)
            .finish()
    }
}
