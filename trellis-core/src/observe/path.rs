//! Compiles dot-delimited path expressions into getters.

use std::sync::Arc;

use super::{Object, Value};
use crate::reactive::{Getter, Owner};

/// Compile `path` (e.g. `"user.address.city"`) into a getter that resolves
/// it against the owner's data.
///
/// Returns `None` unless the path consists only of alphanumerics, `_`, `$`
/// and `.`.
pub fn parse_path(path: &str) -> Option<Getter> {
    let simple = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !simple {
        return None;
    }

    let segments: Arc<[String]> = path.split('.').map(str::to_string).collect();
    let getter: Getter = Arc::new(move |owner: &Owner| Ok(resolve(owner.data(), &segments)));
    Some(getter)
}

/// Walk `segments` from `root` with tracked reads. Numeric segments index
/// into arrays; stepping into a primitive yields `Undefined`.
pub fn resolve(root: &Object, segments: &[String]) -> Value {
    let mut current = Value::Object(root.clone());
    for segment in segments {
        current = match &current {
            Value::Object(obj) => obj.get(segment),
            Value::Array(arr) => match segment.parse::<usize>() {
                Ok(index) => arr.get(index),
                Err(_) => Value::Undefined,
            },
            _ => return Value::Undefined,
        };
    }
    current
}
