//! The nested mapping facade.

use std::collections::BTreeSet;
use std::sync::Arc;

use kvdict_core::{
    flatten, from_value, to_value, KeyCodec, LogicalPath, PathError, PrefixIndex, Value,
    ValueCodec,
};
use kvdict_gateway::StoreGateway;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::bridge::{BridgeState, GatewayHandle, SyncBridge};
use crate::error::{Error, Result};
use crate::options::{MappingBuilder, MappingOptions};
use crate::proxy::Item;

/// Which physical keys an operation touches.
#[derive(Debug, Clone)]
enum Scope {
    /// Every key of the entry point.
    Namespace,
    /// The given base key and everything strictly beneath it.
    Subtree(String),
}

impl Scope {
    fn list_prefix<'a>(&'a self, keys: &'a KeyCodec) -> &'a str {
        match self {
            Scope::Namespace => keys.prefix(),
            Scope::Subtree(base) => base,
        }
    }

    fn contains(&self, keys: &KeyCodec, key: &str) -> bool {
        match self {
            Scope::Namespace => keys.matches(key),
            Scope::Subtree(base) => keys.is_within(key, base),
        }
    }
}

/// State shared by a mapping and every proxy handed out from it.
pub(crate) struct Shared {
    bridge: SyncBridge,
    keys: KeyCodec,
    codec: Arc<dyn ValueCodec>,
    options: MappingOptions,
}

impl Shared {
    fn submit<T, F, Fut>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(GatewayHandle) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    {
        self.bridge.submit(self.options.timeout, op)
    }

    fn base_key(&self, name: &str) -> Result<(LogicalPath, String)> {
        let path = LogicalPath::single(name)?;
        let base = self.keys.encode(&path)?;
        Ok((path, base))
    }

    /// Decoded leaves in scope, as a fresh index.
    fn fetch(&self, scope: Scope) -> Result<PrefixIndex> {
        let keys = self.keys.clone();
        let codec = Arc::clone(&self.codec);
        self.submit(move |gateway| fetch_leaves(gateway, keys, codec, scope))
    }

    /// Logical paths in scope, without fetching values.
    fn list_paths(&self, scope: Scope) -> Result<Vec<LogicalPath>> {
        let keys = self.keys.clone();
        self.submit(move |gateway| list_paths(gateway, keys, scope))
    }

    /// Remove every key in scope. Returns how many were removed.
    fn remove(&self, scope: Scope) -> Result<usize> {
        let keys = self.keys.clone();
        self.submit(move |gateway| remove_keys(gateway, keys, scope))
    }

    pub(crate) fn load(&self, name: &str) -> Result<Option<Value>> {
        let (path, base) = self.base_key(name)?;
        let index = self.fetch(Scope::Subtree(base))?;
        Ok(index.reconstruct(&path))
    }

    /// Replace everything under `name` with `value`.
    ///
    /// Runs as two operations: delete the old subtree, then write the new
    /// leaves. Each is safe to retry; the pair is not atomic.
    pub(crate) fn store(&self, name: &str, value: Value) -> Result<()> {
        let (path, base) = self.base_key(name)?;

        // Encode everything before touching the backend
        let leaves = flatten(&self.keys, path, value)?
            .into_iter()
            .map(|(path, leaf)| {
                let key = self.keys.encode(&path)?;
                let text = self
                    .codec
                    .encode(&leaf)
                    .map_err(|err| Error::encoding(&key, err))?;
                Ok((key, text))
            })
            .collect::<Result<Vec<_>>>()?;

        let removed = self.remove(Scope::Subtree(base))?;
        debug!(key = name, removed, written = leaves.len(), "replacing subtree");
        self.submit(move |gateway| write_leaves(gateway, leaves))
    }

    pub(crate) fn entry_point(&self) -> &str {
        self.keys.entry_point()
    }
}

async fn fetch_leaves(
    gateway: GatewayHandle,
    keys: KeyCodec,
    codec: Arc<dyn ValueCodec>,
    scope: Scope,
) -> Result<PrefixIndex> {
    let listed = gateway.list_keys(scope.list_prefix(&keys)).await?;
    let mut leaves = Vec::with_capacity(listed.len());

    for key in listed {
        if !scope.contains(&keys, &key) {
            continue;
        }
        let path = keys.decode(&key)?;
        // Deleted between listing and reading
        let Some(payload) = gateway.get(&key).await? else {
            continue;
        };
        let value = match codec.decode(&payload) {
            Ok(value) => value,
            Err(err) => return Err(Error::decoding(&key, payload, err)),
        };
        leaves.push((path, value));
    }

    debug!(leaves = leaves.len(), "fetched subtree");
    Ok(PrefixIndex::build(leaves))
}

async fn list_paths(gateway: GatewayHandle, keys: KeyCodec, scope: Scope) -> Result<Vec<LogicalPath>> {
    let listed = gateway.list_keys(scope.list_prefix(&keys)).await?;
    let paths = listed
        .into_iter()
        .filter(|key| scope.contains(&keys, key))
        .map(|key| keys.decode(&key))
        .collect::<std::result::Result<Vec<_>, PathError>>()?;
    Ok(paths)
}

async fn remove_keys(gateway: GatewayHandle, keys: KeyCodec, scope: Scope) -> Result<usize> {
    let listed = gateway.list_keys(scope.list_prefix(&keys)).await?;
    let mut removed = 0;
    for key in listed.into_iter().filter(|key| scope.contains(&keys, key)) {
        trace!(key = %key, "deleting leaf");
        gateway.delete(&key).await?;
        removed += 1;
    }
    Ok(removed)
}

async fn write_leaves(gateway: GatewayHandle, leaves: Vec<(String, String)>) -> Result<()> {
    for (key, text) in leaves {
        trace!(key = %key, "writing leaf");
        gateway.set(&key, &text).await?;
    }
    Ok(())
}

/// A mutable, mapping-like view over one entry point of a flat store.
///
/// Top-level names map to structured [`Value`]s. Records are spread over
/// one physical key per leaf, so other clients can read and write deep
/// paths directly; reads reassemble whatever is stored under a name.
///
/// Every method blocks the calling thread on the mapping's bridge. The
/// mapping is `Send + Sync` and may be shared between threads. Nothing is
/// cached: each call reflects the store at the time of the call.
///
/// # Example
///
/// ```rust
/// use kvdict::{InMemoryGateway, Item, MappingOptions, NestedMapping, Value};
/// use serde_json::json;
///
/// let mapping = NestedMapping::new(InMemoryGateway::new(), MappingOptions::new("ep1")).unwrap();
///
/// mapping.set("main", Value::from(json!({"sup1": {"key": "value"}, "sup2": [1, 2, 3]}))).unwrap();
/// assert_eq!(mapping.keys().unwrap().collect::<Vec<_>>(), vec!["main"]);
///
/// if let Item::Map(main) = mapping.get("main").unwrap() {
///     main.insert("sup3", "added").unwrap();
/// }
/// assert_eq!(
///     mapping.get_value("main").unwrap(),
///     Value::from(json!({"sup1": {"key": "value"}, "sup2": [1, 2, 3], "sup3": "added"})),
/// );
/// ```
pub struct NestedMapping {
    shared: Arc<Shared>,
}

impl NestedMapping {
    /// Open a mapping with the default JSON codec.
    pub fn new(gateway: impl StoreGateway + 'static, options: MappingOptions) -> Result<Self> {
        Self::with_codec(gateway, options, kvdict_core::JsonCodec)
    }

    /// Open a mapping with a custom value codec.
    pub fn with_codec(
        gateway: impl StoreGateway + 'static,
        options: MappingOptions,
        codec: impl ValueCodec + 'static,
    ) -> Result<Self> {
        Self::start(Arc::new(gateway), options, Box::new(codec))
    }

    pub fn builder(gateway: impl StoreGateway + 'static) -> MappingBuilder {
        MappingBuilder::new(Arc::new(gateway))
    }

    pub(crate) fn start(
        gateway: Arc<dyn StoreGateway>,
        options: MappingOptions,
        codec: Box<dyn ValueCodec>,
    ) -> Result<Self> {
        let keys = options.validate()?;
        let bridge = SyncBridge::start(gateway, options.worker_name.as_str())?;
        debug!(entry_point = keys.entry_point(), "mapping opened");
        Ok(Self {
            shared: Arc::new(Shared {
                bridge,
                keys,
                codec: Arc::from(codec),
                options,
            }),
        })
    }

    pub fn options(&self) -> &MappingOptions {
        &self.shared.options
    }

    pub fn entry_point(&self) -> &str {
        self.shared.entry_point()
    }

    /// Lifecycle state of the underlying bridge.
    pub fn state(&self) -> BridgeState {
        self.shared.bridge.state()
    }

    /// Read `key` as a write-through [`Item`].
    ///
    /// Fails with [`Error::NotFound`] when nothing is stored at or below it.
    pub fn get(&self, key: &str) -> Result<Item> {
        let value = self.get_value(key)?;
        Ok(Item::new(Arc::clone(&self.shared), key, value))
    }

    /// Read `key` as a detached value.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        self.try_get(key)?.ok_or_else(|| Error::NotFound {
            key: key.to_string(),
        })
    }

    /// Read `key`, with a miss as `None`.
    pub fn try_get(&self, key: &str) -> Result<Option<Value>> {
        self.shared.load(key)
    }

    /// Read `key` into a Rust type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get_value(key)?;
        from_value(value).map_err(|err| Error::decoding(key, String::new(), err))
    }

    /// Replace whatever is stored under `key` with `value`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.shared.store(key, value.into())
    }

    /// Store a Rust value under `key`.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = to_value(value).map_err(|err| Error::encoding(key, err))?;
        self.set(key, value)
    }

    /// Remove `key` and everything beneath it.
    ///
    /// Fails with [`Error::NotFound`] when nothing was stored there.
    pub fn delete(&self, key: &str) -> Result<()> {
        let (_, base) = self.shared.base_key(key)?;
        let removed = self.shared.remove(Scope::Subtree(base))?;
        debug!(key, removed, "deleted subtree");
        if removed == 0 {
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Whether anything is stored at or below `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let (_, base) = self.shared.base_key(key)?;
        let paths = self.shared.list_paths(Scope::Subtree(base))?;
        Ok(!paths.is_empty())
    }

    /// Top-level names in sorted order.
    ///
    /// The listing is taken once when this is called; call it again to see
    /// later changes. A stored key that does not decode fails the whole
    /// listing with [`PathError::MalformedKey`].
    pub fn keys(&self) -> Result<Keys> {
        let paths = self.shared.list_paths(Scope::Namespace)?;
        let names: BTreeSet<String> = paths
            .into_iter()
            .map(|path| path.first().to_string())
            .collect();
        Ok(Keys {
            inner: names.into_iter().collect::<Vec<_>>().into_iter(),
        })
    }

    /// Number of distinct top-level names.
    pub fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The stored value, or `default` after storing it.
    ///
    /// The read and the write are separate operations.
    pub fn set_default(&self, key: &str, default: impl Into<Value>) -> Result<Value> {
        if let Some(value) = self.try_get(key)? {
            return Ok(value);
        }
        let default = default.into();
        self.set(key, default.clone())?;
        Ok(default)
    }

    /// Remove `key` and return what was stored there.
    pub fn pop(&self, key: &str) -> Result<Value> {
        let value = self.get_value(key)?;
        self.delete(key)?;
        Ok(value)
    }

    /// `set` each pair in turn, stopping at the first failure.
    pub fn update<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Remove every key of the entry point.
    pub fn clear(&self) -> Result<()> {
        let removed = self.shared.remove(Scope::Namespace)?;
        debug!(entry_point = self.entry_point(), removed, "cleared namespace");
        Ok(())
    }

    /// The whole namespace as one detached record of top-level names.
    pub fn snapshot(&self) -> Result<Value> {
        let index = self.shared.fetch(Scope::Namespace)?;
        Ok(index.reconstruct_all())
    }

    /// Stop the bridge and close the gateway.
    ///
    /// Proxies obtained from this mapping fail with
    /// [`Error::BridgeClosed`] afterwards. Dropping the mapping does the same.
    pub fn close(&self) -> Result<()> {
        self.shared.bridge.stop()
    }

    /// Like [`close`](Self::close), but aborts operations still in flight.
    pub fn close_now(&self) -> Result<()> {
        self.shared.bridge.stop_now()
    }
}

impl Drop for NestedMapping {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for NestedMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedMapping")
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Sorted top-level names, as returned by [`NestedMapping::keys`].
#[derive(Debug, Clone)]
pub struct Keys {
    inner: std::vec::IntoIter<String>,
}

impl Iterator for Keys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Keys {}

impl DoubleEndedIterator for Keys {
    fn next_back(&mut self) -> Option<String> {
        self.inner.next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvdict_gateway::InMemoryGateway;
    use serde_json::json;
    use std::time::Duration;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn open(gateway: &InMemoryGateway) -> NestedMapping {
        NestedMapping::new(
            gateway.clone(),
            MappingOptions::new("ep1").with_timeout(TEST_TIMEOUT),
        )
        .unwrap()
    }

    fn raw(gateway: &InMemoryGateway) -> Vec<(String, String)> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(gateway.entries()).into_iter().collect()
    }

    #[test]
    fn set_writes_one_key_per_leaf() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        mapping
            .set("main", v(json!({"sup1": {"key": "value"}, "sup2": [1, 2, 3]})))
            .unwrap();

        assert_eq!(
            raw(&gateway),
            vec![
                ("ep1:main:sup1:key".to_string(), "\"value\"".to_string()),
                ("ep1:main:sup2".to_string(), "[1,2,3]".to_string()),
            ]
        );
    }

    #[test]
    fn set_replaces_subtree() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        mapping.set("k", v(json!({"old": 1, "keep": {"x": 1}}))).unwrap();
        mapping.set("k", v(json!({"new": 2}))).unwrap();

        assert_eq!(mapping.get_value("k").unwrap(), v(json!({"new": 2})));
        assert_eq!(
            raw(&gateway),
            vec![("ep1:k:new".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn set_leaves_string_prefix_siblings_alone() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        mapping.set("user", 1).unwrap();
        mapping.set("users", 2).unwrap();
        mapping.set("user", 3).unwrap();

        assert_eq!(mapping.get_value("users").unwrap(), Value::from(2));
        assert_eq!(mapping.get_value("user").unwrap(), Value::from(3));
    }

    #[test]
    fn get_missing_is_not_found() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        assert!(matches!(mapping.get("nope"), Err(Error::NotFound { .. })));
        assert_eq!(mapping.try_get("nope").unwrap(), None);
        assert!(!mapping.contains_key("nope").unwrap());
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        for key in ["", "_value", "a:b"] {
            assert!(matches!(mapping.set(key, 1), Err(Error::Path(_))), "{key}");
            assert!(matches!(mapping.try_get(key), Err(Error::Path(_))), "{key}");
        }
        assert!(raw(&gateway).is_empty());
    }

    #[test]
    fn delete_removes_subtree_or_fails() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        mapping.set("a", v(json!({"b": {"c": 1}, "d": 2}))).unwrap();
        mapping.set("ab", 3).unwrap();
        mapping.delete("a").unwrap();

        assert_eq!(
            raw(&gateway),
            vec![("ep1:ab".to_string(), "3".to_string())]
        );
        assert!(matches!(mapping.delete("a"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn keys_len_and_snapshot() {
        let gateway = InMemoryGateway::with_entries([
            ("ep1:zeta", "1"),
            ("ep1:alpha:x", "2"),
            ("ep1:alpha:y", "3"),
            ("ep2:other", "4"),
        ]);
        let mapping = open(&gateway);

        assert_eq!(mapping.keys().unwrap().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert_eq!(mapping.len().unwrap(), 2);
        assert!(!mapping.is_empty().unwrap());
        assert_eq!(
            mapping.snapshot().unwrap(),
            v(json!({"alpha": {"x": 2, "y": 3}, "zeta": 1}))
        );
    }

    #[test]
    fn malformed_keys_fail_reads() {
        let gateway = InMemoryGateway::with_entries([("ep1:good", "1"), ("ep1:a::b", "2")]);
        let mapping = open(&gateway);

        let is_malformed = |result: Result<_>| {
            matches!(
                result,
                Err(Error::Path(PathError::MalformedKey { ref key, .. })) if key == "ep1:a::b"
            )
        };
        assert!(is_malformed(mapping.get_value("a").map(|_| ())));
        assert!(is_malformed(mapping.try_get("a").map(|_| ())));
        assert!(is_malformed(mapping.contains_key("a").map(|_| ())));
        assert!(is_malformed(mapping.keys().map(|_| ())));
        assert!(is_malformed(mapping.len().map(|_| ())));
        assert!(is_malformed(mapping.snapshot().map(|_| ())));

        // Names outside the bad subtree still read normally
        assert_eq!(mapping.get_value("good").unwrap(), Value::from(1));

        // Delete still clears the whole subtree, bad key included
        mapping.delete("a").unwrap();
        assert_eq!(mapping.keys().unwrap().collect::<Vec<_>>(), vec!["good"]);
    }

    #[test]
    fn stored_sentinel_name_fails_listing() {
        let gateway = InMemoryGateway::with_entries([("ep1:_value", "1"), ("ep1:k:_value", "2")]);
        let mapping = open(&gateway);

        assert!(matches!(
            mapping.keys(),
            Err(Error::Path(PathError::MalformedKey { ref key, .. })) if key == "ep1:_value"
        ));
        // A sentinel below the top level still decodes
        assert_eq!(mapping.get_value("k").unwrap(), v(json!({"_value": 2})));
    }

    #[test]
    fn undecodable_payload_reports_key_and_payload() {
        let gateway = InMemoryGateway::with_entries([("ep1:k", "{broken")]);
        let mapping = open(&gateway);

        match mapping.get_value("k") {
            Err(Error::Encoding { key, payload, .. }) => {
                assert_eq!(key, "ep1:k");
                assert_eq!(payload, "{broken");
            }
            other => panic!("expected encoding error, got {:?}", other),
        }
    }

    #[test]
    fn mixing_methods() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);

        assert_eq!(mapping.set_default("n", 1).unwrap(), Value::from(1));
        assert_eq!(mapping.set_default("n", 2).unwrap(), Value::from(1));

        mapping.update([("a", 10), ("b", 20)]).unwrap();
        assert_eq!(mapping.len().unwrap(), 3);

        assert_eq!(mapping.pop("a").unwrap(), Value::from(10));
        assert!(matches!(mapping.pop("a"), Err(Error::NotFound { .. })));

        mapping.clear().unwrap();
        assert!(mapping.is_empty().unwrap());
    }

    #[test]
    fn typed_access() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Profile {
            name: String,
            tags: Vec<String>,
        }

        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);
        let profile = Profile {
            name: "alice".to_string(),
            tags: vec!["admin".to_string()],
        };

        mapping.set_as("profile", &profile).unwrap();
        assert_eq!(mapping.get_as::<Profile>("profile").unwrap(), profile);
        assert!(matches!(
            mapping.get_as::<u32>("profile"),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn close_stops_bridge_and_gateway() {
        let gateway = InMemoryGateway::new();
        let mapping = open(&gateway);
        mapping.set("k", 1).unwrap();

        mapping.close().unwrap();
        assert_eq!(mapping.state(), BridgeState::Stopped);
        assert!(matches!(mapping.get_value("k"), Err(Error::BridgeClosed)));

        // Data is still in the shared store
        assert_eq!(raw(&gateway), vec![("ep1:k".to_string(), "1".to_string())]);
    }
}
