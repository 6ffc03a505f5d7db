//! Splitting a value into the leaves that `set` writes.

use crate::{KeyCodec, LogicalPath, PathError, Value};

/// Flatten `value` rooted at `path` into `(path, leaf)` pairs.
///
/// A record becomes deeper leaves only when it is non-empty and every key is
/// a valid segment for `codec`. Anything else (scalars, sequences, empty
/// records, records with an unusable key) is a single leaf at its own path,
/// so reading the paths back through a `PrefixIndex` yields `value` again.
///
/// Leaves come out in key order.
///
/// # Example
///
/// ```rust
/// use kvdict_core::{flatten, path, KeyCodec, Value};
///
/// let codec = KeyCodec::new("ep", ":").unwrap();
/// let value = Value::from(serde_json::json!({"a": {"b": 1}, "c": [2]}));
/// let leaves = flatten(&codec, path!["top"], value).unwrap();
///
/// assert_eq!(leaves, vec![
///     (path!["top", "a", "b"], Value::from(1)),
///     (path!["top", "c"], Value::from(vec![2])),
/// ]);
/// ```
pub fn flatten(
    codec: &KeyCodec,
    path: LogicalPath,
    value: Value,
) -> Result<Vec<(LogicalPath, Value)>, PathError> {
    // Surfaces separator clashes in the root path before any work is done
    codec.encode(&path)?;

    let mut leaves = Vec::new();
    collect(codec, path, value, &mut leaves)?;
    Ok(leaves)
}

fn collect(
    codec: &KeyCodec,
    path: LogicalPath,
    value: Value,
    leaves: &mut Vec<(LogicalPath, Value)>,
) -> Result<(), PathError> {
    match value {
        Value::Map(map) if is_splittable(codec, &map) => {
            for (name, child) in map {
                let child_path = path.join(name)?;
                collect(codec, child_path, child, leaves)?;
            }
        }
        other => leaves.push((path, other)),
    }
    Ok(())
}

fn is_splittable(codec: &KeyCodec, map: &std::collections::BTreeMap<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|name| codec.is_valid_segment(name))
}
