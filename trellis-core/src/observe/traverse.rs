//! Deep traversal for deep watchers.

use std::collections::HashSet;

use super::Value;

/// Read every field and element reachable from `value` through tracked
/// accessors, so the evaluating watcher depends on all of them.
///
/// Each container is visited once, which bounds cyclic structures.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    let mut stack = vec![value.clone()];

    while let Some(value) = stack.pop() {
        match &value {
            Value::Object(obj) => {
                if !seen.insert(obj.id()) {
                    continue;
                }
                for key in obj.keys() {
                    stack.push(obj.get(&key));
                }
            }
            Value::Array(arr) => {
                if !seen.insert(arr.id()) {
                    continue;
                }
                stack.extend(arr.items());
            }
            _ => {}
        }
    }
}
