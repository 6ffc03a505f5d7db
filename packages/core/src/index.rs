//! A prefix trie over the leaves of one namespace.
//!
//! `PrefixIndex` is built fresh for every logical read from whatever the
//! backend listing returned, queried, and thrown away. It is never cached,
//! so it can never go stale.

use std::collections::BTreeMap;

use crate::resolve::resolve;
use crate::{LogicalPath, Value};

#[derive(Debug, Clone, Default)]
struct Node {
    value: Option<Value>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn reconstruct(&self) -> Option<Value> {
        let children: BTreeMap<String, Value> = self
            .children
            .iter()
            .filter_map(|(name, child)| child.reconstruct().map(|v| (name.clone(), v)))
            .collect();
        resolve(self.value.clone(), children)
    }

    fn leaf_count(&self) -> usize {
        let self_count = usize::from(self.value.is_some());
        let children_count: usize = self.children.values().map(Node::leaf_count).sum();
        self_count + children_count
    }
}

/// A prefix trie keyed by path segments, holding decoded leaf values.
///
/// The root is the entry point itself and never holds a value; its children
/// are the top-level names.
///
/// # Example
///
/// ```rust
/// use kvdict_core::{path, PrefixIndex, Value};
///
/// let index = PrefixIndex::build([
///     (path!["a", "b"], Value::from(serde_json::json!({"x": 1}))),
///     (path!["a", "b", "c"], Value::from(vec![1, 2, 3])),
/// ]);
///
/// assert_eq!(index.children_of(&path!["a"]), vec!["b"]);
/// assert!(index.value_at(&path!["a"]).is_none());
/// assert_eq!(
///     index.reconstruct(&path!["a", "b"]).unwrap(),
///     Value::from(serde_json::json!({"x": 1, "c": [1, 2, 3]})),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    root: Node,
}

impl PrefixIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from decoded leaves. Linear in the total segment count.
    ///
    /// If two leaves share a path the later one wins.
    pub fn build(leaves: impl IntoIterator<Item = (LogicalPath, Value)>) -> Self {
        let mut index = Self::new();
        for (path, value) in leaves {
            index.insert(&path, value);
        }
        index
    }

    /// Insert a value at path. Returns previous value if any.
    pub fn insert(&mut self, path: &LogicalPath, value: Value) -> Option<Value> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current.children.entry(segment.clone()).or_default();
        }
        current.value.replace(value)
    }

    /// Navigate to node if it exists.
    fn node(&self, path: &LogicalPath) -> Option<&Node> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    /// Names one level below `path`, in sorted order.
    pub fn children_of(&self, path: &LogicalPath) -> Vec<&str> {
        self.node(path)
            .map(|node| node.children.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Decoded value stored exactly at `path`.
    pub fn value_at(&self, path: &LogicalPath) -> Option<&Value> {
        self.node(path)?.value.as_ref()
    }

    /// Whether anything is stored below `path`.
    pub fn has_children(&self, path: &LogicalPath) -> bool {
        self.node(path).is_some_and(|node| !node.children.is_empty())
    }

    /// Materialize the logical value at `path`.
    ///
    /// Returns `None` when nothing is stored at or below `path`.
    pub fn reconstruct(&self, path: &LogicalPath) -> Option<Value> {
        self.node(path)?.reconstruct()
    }

    /// Materialize the whole namespace as one record of top-level names.
    pub fn reconstruct_all(&self) -> Value {
        self.root.reconstruct().unwrap_or_else(Value::map)
    }

    /// Distinct top-level names, sorted.
    pub fn top_level(&self) -> Vec<&str> {
        self.root.children.keys().map(String::as_str).collect()
    }

    /// Count of stored leaves (not nodes).
    pub fn len(&self) -> usize {
        self.root.leaf_count()
    }

    /// True if no leaves anywhere in the index.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(LogicalPath, Value)> for PrefixIndex {
    fn from_iter<I: IntoIterator<Item = (LogicalPath, Value)>>(iter: I) -> Self {
        Self::build(iter)
    }
}
