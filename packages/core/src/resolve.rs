//! Conflict resolution for paths that are both a leaf and a parent.

use std::collections::BTreeMap;

use crate::path::SENTINEL_KEY;
use crate::Value;

/// Produce the logical value of one trie node.
///
/// `stored` is the value stored exactly at the node, `children` the already
/// reconstructed values of its child paths. Returns `None` when the node
/// carries neither, which callers treat as a miss.
///
/// | stored | children | result |
/// |---|---|---|
/// | none | none | miss |
/// | none | some | record of children |
/// | any | none | stored value verbatim |
/// | record | some | `deep_merge(stored, children)` |
/// | scalar / sequence | some | `{"_value": stored, ..children}` |
///
/// No stored value is ever dropped.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use kvdict_core::{resolve, Value};
///
/// let children = BTreeMap::from([("c".to_string(), Value::from(true))]);
/// let merged = resolve(Some(Value::from(vec![1, 2, 3])), children).unwrap();
///
/// assert_eq!(merged, Value::from(serde_json::json!({"_value": [1, 2, 3], "c": true})));
/// ```
pub fn resolve(stored: Option<Value>, children: BTreeMap<String, Value>) -> Option<Value> {
    match stored {
        None if children.is_empty() => None,
        None => Some(Value::Map(children)),
        Some(value) if children.is_empty() => Some(value),
        Some(Value::Map(record)) => Some(Value::Map(deep_merge(record, children))),
        Some(value) => {
            let mut out = BTreeMap::new();
            out.insert(SENTINEL_KEY.to_string(), value);
            out.extend(children);
            Some(Value::Map(out))
        }
    }
}

/// Merge `overlay` into `base`, with `overlay` winning on shared keys.
///
/// Shared keys are combined rather than replaced where that loses nothing:
/// two records merge recursively, and a non-record base entry under a record
/// overlay entry is kept as the overlay's `"_value"`.
pub fn deep_merge(
    mut base: BTreeMap<String, Value>,
    overlay: BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    for (key, incoming) in overlay {
        let merged = match (base.remove(&key), incoming) {
            (Some(Value::Map(left)), Value::Map(right)) => Value::Map(deep_merge(left, right)),
            (Some(existing), Value::Map(right)) => {
                let mut wrapped = BTreeMap::new();
                wrapped.insert(SENTINEL_KEY.to_string(), existing);
                wrapped.extend(right);
                Value::Map(wrapped)
            }
            (_, incoming) => incoming,
        };
        base.insert(key, merged);
    }
    base
}
