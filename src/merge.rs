//! Recursive merges over YAML values.
//!
//! [`merge_recursive`] combines dependency declarations: mappings merge key by
//! key, sequences concatenate, and two scalars under the same key are
//! collected into a sequence holding both. [`merge_deep`] overlays
//! configuration: mappings merge key by key, sequences concatenate, and any
//! other conflict is won by the overlay.

use serde_yaml::{Mapping, Value};

pub fn merge_recursive(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            Value::Mapping(merge_mappings(base, overlay, merge_recursive))
        }
        (Value::Null, overlay) => overlay,
        (base, Value::Null) => base,
        (base, overlay) => {
            let mut items = into_items(base);
            items.extend(into_items(overlay));
            Value::Sequence(items)
        }
    }
}

pub fn merge_deep(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            Value::Mapping(merge_mappings(base, overlay, merge_deep))
        }
        (Value::Sequence(mut base), Value::Sequence(overlay)) => {
            base.extend(overlay);
            Value::Sequence(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn merge_mappings(
    mut base: Mapping,
    overlay: Mapping,
    merge: fn(Value, Value) -> Value,
) -> Mapping {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => {
                let current = std::mem::take(existing);
                *existing = merge(current, value);
            }
            None => {
                base.insert(key, value);
            }
        }
    }
    base
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Sequence(items) => items,
        other => vec![other],
    }
}
