//! Write-through views of records and sequences.
//!
//! A proxy holds a copy of one top-level value and a location inside it.
//! Every mutation edits the copy and then stores the whole top-level value
//! again, so changes made through deeply nested proxies persist too.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kvdict_core::Value;

use crate::error::{Error, Result};
use crate::mapping::Shared;

/// What [`NestedMapping::get`](crate::NestedMapping::get) returns.
#[derive(Debug, Clone)]
pub enum Item {
    /// A record, editable in place.
    Map(MapProxy),
    /// A sequence, editable in place.
    List(ListProxy),
    /// Anything else, detached.
    Scalar(Value),
}

impl Item {
    pub(crate) fn new(shared: Arc<Shared>, key: &str, value: Value) -> Self {
        match value {
            value @ Value::Map(_) => Item::Map(MapProxy {
                root: ProxyRoot::new(shared, key, value),
                steps: Vec::new(),
            }),
            value @ Value::Array(_) => Item::List(ListProxy {
                root: ProxyRoot::new(shared, key, value),
                steps: Vec::new(),
            }),
            value => Item::Scalar(value),
        }
    }

    /// Detached copy of the current value.
    pub fn to_value(&self) -> Value {
        match self {
            Item::Map(map) => map.to_value(),
            Item::List(list) => list.to_value(),
            Item::Scalar(value) => value.clone(),
        }
    }

    pub fn into_map(self) -> Option<MapProxy> {
        match self {
            Item::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<ListProxy> {
        match self {
            Item::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            Item::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

struct ProxyRoot {
    shared: Arc<Shared>,
    key: String,
    value: Mutex<Value>,
}

impl ProxyRoot {
    fn new(shared: Arc<Shared>, key: &str, value: Value) -> Arc<Self> {
        Arc::new(ProxyRoot {
            shared,
            key: key.to_string(),
            value: Mutex::new(value),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn describe(&self, steps: &[Step]) -> String {
        let mut out = self.key.clone();
        for step in steps {
            match step {
                Step::Key(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Step::Index(i) => out.push_str(&format!("[{}]", i)),
            }
        }
        out
    }

    fn error(&self, steps: &[Step], message: impl fmt::Display) -> Error {
        Error::Proxy {
            key: self.key.clone(),
            message: format!("{}: {}", self.describe(steps), message),
        }
    }

    fn read<R>(&self, steps: &[Step], f: impl FnOnce(&Value) -> R) -> Result<R> {
        let guard = self.lock();
        let target = locate(&guard, steps).ok_or_else(|| self.error(steps, "no longer exists"))?;
        Ok(f(target))
    }

    /// Apply `f` at the location, then persist the whole root value.
    ///
    /// The lock is held until the write completes, so edits through one root
    /// persist in the order they were applied. If persisting fails the held
    /// copy is rolled back.
    fn write<R>(&self, steps: &[Step], f: impl FnOnce(&mut Value) -> Result<R>) -> Result<R> {
        let mut guard = self.lock();
        let before = guard.clone();
        let target =
            locate_mut(&mut guard, steps).ok_or_else(|| self.error(steps, "no longer exists"))?;
        let out = f(target)?;
        if let Err(err) = self.shared.store(&self.key, guard.clone()) {
            *guard = before;
            return Err(err);
        }
        Ok(out)
    }

    fn read_map<R>(
        &self,
        steps: &[Step],
        f: impl FnOnce(&BTreeMap<String, Value>) -> R,
    ) -> Result<R> {
        self.read(steps, |value| value.as_map().map(f))?
            .ok_or_else(|| self.error(steps, "is no longer a record"))
    }

    fn write_map<R>(
        &self,
        steps: &[Step],
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> Result<R>,
    ) -> Result<R> {
        self.write(steps, |value| match value.as_map_mut() {
            Some(map) => f(map),
            None => Err(self.error(steps, "is no longer a record")),
        })
    }

    fn read_list<R>(&self, steps: &[Step], f: impl FnOnce(&Vec<Value>) -> R) -> Result<R> {
        self.read(steps, |value| value.as_array().map(f))?
            .ok_or_else(|| self.error(steps, "is no longer a sequence"))
    }

    fn write_list<R>(
        &self,
        steps: &[Step],
        f: impl FnOnce(&mut Vec<Value>) -> Result<R>,
    ) -> Result<R> {
        self.write(steps, |value| match value.as_array_mut() {
            Some(list) => f(list),
            None => Err(self.error(steps, "is no longer a sequence")),
        })
    }
}

fn locate<'v>(value: &'v Value, steps: &[Step]) -> Option<&'v Value> {
    steps.iter().try_fold(value, |current, step| match step {
        Step::Key(name) => current.as_map()?.get(name),
        Step::Index(i) => current.as_array()?.get(*i),
    })
}

fn locate_mut<'v>(value: &'v mut Value, steps: &[Step]) -> Option<&'v mut Value> {
    steps.iter().try_fold(value, |current, step| match step {
        Step::Key(name) => current.as_map_mut()?.get_mut(name),
        Step::Index(i) => current.as_array_mut()?.get_mut(*i),
    })
}

fn child_steps(steps: &[Step], step: Step) -> Vec<Step> {
    let mut out = steps.to_vec();
    out.push(step);
    out
}

/// A record inside a top-level value.
///
/// Reads come from the copy taken when the top-level value was fetched.
/// Writes update that copy and store the full top-level value back.
///
/// # Example
///
/// ```rust
/// use kvdict::{InMemoryGateway, MappingOptions, NestedMapping, Value};
/// use serde_json::json;
///
/// let mapping = NestedMapping::new(InMemoryGateway::new(), MappingOptions::new("ep")).unwrap();
/// mapping.set("user", Value::from(json!({"profile": {"name": "alice"}}))).unwrap();
///
/// let user = mapping.get("user").unwrap().into_map().unwrap();
/// user.map("profile").unwrap().insert("age", 30).unwrap();
///
/// assert_eq!(
///     mapping.get_value("user").unwrap(),
///     Value::from(json!({"profile": {"name": "alice", "age": 30}})),
/// );
/// ```
#[derive(Clone)]
pub struct MapProxy {
    root: Arc<ProxyRoot>,
    steps: Vec<Step>,
}

impl MapProxy {
    /// Top-level key this proxy writes back to.
    pub fn key(&self) -> &str {
        &self.root.key
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        self.root
            .read_map(&self.steps, |map| map.get(name).cloned())
    }

    pub fn contains_key(&self, name: &str) -> Result<bool> {
        self.root
            .read_map(&self.steps, |map| map.contains_key(name))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.root
            .read_map(&self.steps, |map| map.keys().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        self.root.read_map(&self.steps, BTreeMap::len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.root.read_map(&self.steps, BTreeMap::is_empty)
    }

    /// Set `name`, returning the previous value. Persists.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let name = name.into();
        let value = value.into();
        self.root
            .write_map(&self.steps, |map| Ok(map.insert(name, value)))
    }

    /// Remove `name`, returning its value. Persists only if it was present.
    pub fn remove(&self, name: &str) -> Result<Option<Value>> {
        if !self.contains_key(name)? {
            return Ok(None);
        }
        self.root
            .write_map(&self.steps, |map| Ok(map.remove(name)))
    }

    /// Insert every pair, then persist once.
    pub fn update<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let entries: Vec<(String, Value)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.root.write_map(&self.steps, |map| {
            map.extend(entries);
            Ok(())
        })
    }

    /// Remove every entry. Persists.
    pub fn clear(&self) -> Result<()> {
        self.root.write_map(&self.steps, |map| {
            map.clear();
            Ok(())
        })
    }

    /// Proxy for the record stored at `name`.
    pub fn map(&self, name: &str) -> Result<MapProxy> {
        let steps = child_steps(&self.steps, Step::Key(name.to_string()));
        self.root.read_map(&steps, |_| ())?;
        Ok(MapProxy {
            root: Arc::clone(&self.root),
            steps,
        })
    }

    /// Proxy for the sequence stored at `name`.
    pub fn list(&self, name: &str) -> Result<ListProxy> {
        let steps = child_steps(&self.steps, Step::Key(name.to_string()));
        self.root.read_list(&steps, |_| ())?;
        Ok(ListProxy {
            root: Arc::clone(&self.root),
            steps,
        })
    }

    /// Detached copy of this record as currently held.
    pub fn to_value(&self) -> Value {
        self.root
            .read(&self.steps, Value::clone)
            .unwrap_or_default()
    }
}

impl fmt::Debug for MapProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProxy")
            .field("location", &self.root.describe(&self.steps))
            .finish_non_exhaustive()
    }
}

/// A sequence inside a top-level value.
///
/// Same write-through behavior as [`MapProxy`].
#[derive(Clone)]
pub struct ListProxy {
    root: Arc<ProxyRoot>,
    steps: Vec<Step>,
}

impl ListProxy {
    pub fn key(&self) -> &str {
        &self.root.key
    }

    pub fn get(&self, index: usize) -> Result<Option<Value>> {
        self.root
            .read_list(&self.steps, |list| list.get(index).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        self.root.read_list(&self.steps, Vec::len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.root.read_list(&self.steps, Vec::is_empty)
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.root.write_list(&self.steps, |list| {
            list.push(value);
            Ok(())
        })
    }

    /// Insert at `index`, shifting later elements. `index == len` appends.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.root.write_list(&self.steps, |list| {
            if index > list.len() {
                return Err(self.out_of_range(index, list.len()));
            }
            list.insert(index, value);
            Ok(())
        })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        self.root.write_list(&self.steps, |list| {
            let len = list.len();
            let slot = list
                .get_mut(index)
                .ok_or_else(|| self.out_of_range(index, len))?;
            Ok(std::mem::replace(slot, value))
        })
    }

    pub fn remove(&self, index: usize) -> Result<Value> {
        self.root.write_list(&self.steps, |list| {
            if index >= list.len() {
                return Err(self.out_of_range(index, list.len()));
            }
            Ok(list.remove(index))
        })
    }

    /// Remove the last element. Persists only if there was one.
    pub fn pop(&self) -> Result<Option<Value>> {
        if self.is_empty()? {
            return Ok(None);
        }
        self.root.write_list(&self.steps, |list| Ok(list.pop()))
    }

    /// Append every value, then persist once.
    pub fn extend<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<()> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.root.write_list(&self.steps, |list| {
            list.extend(values);
            Ok(())
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.root.write_list(&self.steps, |list| {
            list.clear();
            Ok(())
        })
    }

    /// Proxy for the record at `index`.
    pub fn map(&self, index: usize) -> Result<MapProxy> {
        let steps = child_steps(&self.steps, Step::Index(index));
        self.root.read_map(&steps, |_| ())?;
        Ok(MapProxy {
            root: Arc::clone(&self.root),
            steps,
        })
    }

    /// Proxy for the sequence at `index`.
    pub fn list(&self, index: usize) -> Result<ListProxy> {
        let steps = child_steps(&self.steps, Step::Index(index));
        self.root.read_list(&steps, |_| ())?;
        Ok(ListProxy {
            root: Arc::clone(&self.root),
            steps,
        })
    }

    pub fn to_value(&self) -> Value {
        self.root
            .read(&self.steps, Value::clone)
            .unwrap_or_default()
    }

    fn out_of_range(&self, index: usize, len: usize) -> Error {
        self.root.error(
            &self.steps,
            format!("index {} out of range for length {}", index, len),
        )
    }
}

impl fmt::Debug for ListProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListProxy")
            .field("location", &self.root.describe(&self.steps))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MappingOptions, NestedMapping};
    use kvdict_gateway::InMemoryGateway;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn mapping_with(key: &str, value: serde_json::Value) -> NestedMapping {
        let mapping = NestedMapping::new(InMemoryGateway::new(), MappingOptions::new("ep")).unwrap();
        mapping.set(key, v(value)).unwrap();
        mapping
    }

    #[test]
    fn scalars_are_detached() {
        let mapping = mapping_with("n", json!(5));
        let item = mapping.get("n").unwrap();
        assert_eq!(item.to_value(), Value::from(5));
        assert_eq!(item.into_scalar(), Some(Value::from(5)));
    }

    #[test]
    fn map_reads() {
        let mapping = mapping_with("user", json!({"name": "alice", "tags": ["a"]}));
        let user = mapping.get("user").unwrap().into_map().unwrap();

        assert_eq!(user.key(), "user");
        assert_eq!(user.get("name").unwrap(), Some(Value::from("alice")));
        assert_eq!(user.get("missing").unwrap(), None);
        assert!(user.contains_key("tags").unwrap());
        assert_eq!(user.keys().unwrap(), vec!["name", "tags"]);
        assert_eq!(user.len().unwrap(), 2);
    }

    #[test]
    fn map_insert_persists() {
        let mapping = mapping_with("user", json!({"name": "alice"}));
        let user = mapping.get("user").unwrap().into_map().unwrap();

        assert_eq!(user.insert("age", 30).unwrap(), None);
        assert_eq!(
            mapping.get_value("user").unwrap(),
            v(json!({"name": "alice", "age": 30}))
        );
    }

    #[test]
    fn map_update_remove_clear_persist() {
        let mapping = mapping_with("cfg", json!({"a": 1, "b": 2}));
        let cfg = mapping.get("cfg").unwrap().into_map().unwrap();

        cfg.update([("c", 3), ("a", 10)]).unwrap();
        assert_eq!(mapping.get_value("cfg").unwrap(), v(json!({"a": 10, "b": 2, "c": 3})));

        assert_eq!(cfg.remove("b").unwrap(), Some(Value::from(2)));
        assert_eq!(cfg.remove("b").unwrap(), None);
        assert_eq!(mapping.get_value("cfg").unwrap(), v(json!({"a": 10, "c": 3})));

        // An emptied record is still stored, as an empty record
        cfg.clear().unwrap();
        assert_eq!(mapping.get_value("cfg").unwrap(), v(json!({})));
    }

    #[test]
    fn nested_map_mutation_persists_root() {
        let mapping = mapping_with("main", json!({"sup1": {"key": "value"}, "other": 1}));
        let main = mapping.get("main").unwrap().into_map().unwrap();

        let sup1 = main.map("sup1").unwrap();
        sup1.insert("key", "changed").unwrap();

        // Visible through the parent proxy
        assert_eq!(
            main.get("sup1").unwrap(),
            Some(v(json!({"key": "changed"})))
        );
        assert_eq!(
            mapping.get_value("main").unwrap(),
            v(json!({"sup1": {"key": "changed"}, "other": 1}))
        );
    }

    #[test]
    fn list_mutations_persist() {
        let mapping = mapping_with("xs", json!([1, 2, 3]));
        let xs = mapping.get("xs").unwrap().into_list().unwrap();

        xs.push(4).unwrap();
        assert_eq!(xs.set(0, 0).unwrap(), Value::from(1));
        xs.insert(1, 9).unwrap();
        assert_eq!(xs.remove(2).unwrap(), Value::from(2));
        assert_eq!(xs.pop().unwrap(), Some(Value::from(4)));
        xs.extend([7, 8]).unwrap();

        assert_eq!(xs.to_value(), v(json!([0, 9, 3, 7, 8])));
        assert_eq!(mapping.get_value("xs").unwrap(), v(json!([0, 9, 3, 7, 8])));
    }

    #[test]
    fn list_index_out_of_range() {
        let mapping = mapping_with("xs", json!([1]));
        let xs = mapping.get("xs").unwrap().into_list().unwrap();

        assert!(matches!(xs.set(5, 0), Err(Error::Proxy { .. })));
        assert!(matches!(xs.remove(1), Err(Error::Proxy { .. })));
        assert!(matches!(xs.insert(3, 0), Err(Error::Proxy { .. })));
        assert_eq!(xs.get(1).unwrap(), None);

        // Nothing was written by the failed calls
        assert_eq!(mapping.get_value("xs").unwrap(), v(json!([1])));
    }

    #[test]
    fn nested_list_in_map_and_map_in_list() {
        let mapping = mapping_with("doc", json!({"items": [{"id": 1}], "tags": []}));
        let doc = mapping.get("doc").unwrap().into_map().unwrap();

        let items = doc.list("items").unwrap();
        items.map(0).unwrap().insert("done", true).unwrap();
        doc.list("tags").unwrap().push("new").unwrap();

        assert_eq!(
            mapping.get_value("doc").unwrap(),
            v(json!({"items": [{"id": 1, "done": true}], "tags": ["new"]}))
        );
    }

    #[test]
    fn wrong_shape_is_proxy_error() {
        let mapping = mapping_with("doc", json!({"n": 1, "xs": [1]}));
        let doc = mapping.get("doc").unwrap().into_map().unwrap();

        assert!(matches!(doc.map("n"), Err(Error::Proxy { .. })));
        assert!(matches!(doc.list("missing"), Err(Error::Proxy { .. })));
        assert!(matches!(doc.list("xs").unwrap().map(0), Err(Error::Proxy { .. })));
    }

    #[test]
    fn stale_child_proxy_reports_location() {
        let mapping = mapping_with("doc", json!({"inner": {"a": 1}}));
        let doc = mapping.get("doc").unwrap().into_map().unwrap();
        let inner = doc.map("inner").unwrap();

        doc.insert("inner", 5).unwrap();
        match inner.insert("b", 2) {
            Err(Error::Proxy { key, message }) => {
                assert_eq!(key, "doc");
                assert!(message.contains("doc.inner"), "{message}");
            }
            other => panic!("expected proxy error, got {:?}", other),
        }
    }

    #[test]
    fn proxy_after_close_is_bridge_closed() {
        let mapping = mapping_with("user", json!({"name": "alice"}));
        let user = mapping.get("user").unwrap().into_map().unwrap();
        drop(mapping);

        // Reads still work from the held copy; writes cannot persist
        assert_eq!(user.get("name").unwrap(), Some(Value::from("alice")));
        assert!(matches!(user.insert("x", 1), Err(Error::BridgeClosed)));
        assert!(!user.contains_key("x").unwrap());
    }
}
