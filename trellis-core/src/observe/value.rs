//! Dynamic values flowing through watchers.

use std::fmt;
use std::sync::Arc;

use super::{Array, Object};
use crate::reactive::{Dep, DepId};

/// A value a getter can produce.
///
/// Primitives compare by value. `Object` and `Array` are composite: they
/// compare by identity and can change in place, which is why a watcher on a
/// composite value fires on every run.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Array(Array),
}

impl Value {
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Strict equality: primitives by value, composites by identity.
    /// `NaN` is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether writing `other` over `self` is a no-op. Like `strict_eq`, but
    /// `NaN` replacing `NaN` counts as unchanged.
    pub(crate) fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    /// The dep notified when a composite value changes shape.
    pub(crate) fn child_dep(&self) -> Option<&Dep> {
        match self {
            Self::Object(obj) => Some(obj.dep()),
            Self::Array(arr) => Some(arr.dep()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Build a reactive value from JSON. Objects and arrays become fresh
    /// observable containers.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.into()),
            serde_json::Value::Array(items) => {
                Self::Array(Array::from_values(items.into_iter().map(Self::from_json)))
            }
            serde_json::Value::Object(map) => Self::Object(Object::from_entries(
                map.into_iter().map(|(k, v)| (k, Self::from_json(v))),
            )),
        }
    }

    /// Snapshot as JSON without tracking. `Undefined` and back-references
    /// into an enclosing container become `null`; non-finite numbers too.
    pub fn to_json(&self) -> serde_json::Value {
        let mut ancestors = Vec::new();
        self.to_json_inner(&mut ancestors)
    }

    fn to_json_inner(&self, ancestors: &mut Vec<DepId>) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Object(obj) => {
                if ancestors.contains(&obj.id()) {
                    return serde_json::Value::Null;
                }
                ancestors.push(obj.id());
                let map = obj
                    .entries_untracked()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json_inner(ancestors)))
                    .collect();
                ancestors.pop();
                serde_json::Value::Object(map)
            }
            Self::Array(arr) => {
                if ancestors.contains(&arr.id()) {
                    return serde_json::Value::Null;
                }
                ancestors.push(arr.id());
                let items = arr
                    .items_untracked()
                    .iter()
                    .map(|v| v.to_json_inner(ancestors))
                    .collect();
                ancestors.pop();
                serde_json::Value::Array(items)
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Object(obj) => fmt::Debug::fmt(obj, f),
            Self::Array(arr) => fmt::Debug::fmt(arr, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Self::Object(obj)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Self::Array(arr)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(json)
    }
}
