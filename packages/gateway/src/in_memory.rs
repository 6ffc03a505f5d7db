//! In-memory gateway.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{GatewayError, StoreGateway};

/// A gateway backed by an in-process ordered map.
///
/// Cloning an `InMemoryGateway` behaves like opening a second connection to
/// the same server: the clones share the keyspace, but each has its own
/// open/closed state. Closing one clone does not affect the others.
///
/// # Example
///
/// ```rust
/// use kvdict_gateway::{InMemoryGateway, StoreGateway};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let first = InMemoryGateway::new();
/// let second = first.clone();
///
/// first.set("ep:k", "1").await.unwrap();
/// assert_eq!(second.get("ep:k").await.unwrap(), Some("1".to_string()));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    data: Arc<RwLock<BTreeMap<String, String>>>,
    closed: AtomicBool,
}

impl InMemoryGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway pre-populated with raw key/value pairs.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Arc::new(RwLock::new(data)),
            closed: AtomicBool::new(false),
        }
    }

    /// Copy of every stored pair, in key order.
    pub async fn entries(&self) -> BTreeMap<String, String> {
        self.data.read().await.clone()
    }

    /// Whether this handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), GatewayError> {
        if self.is_closed() {
            Err(GatewayError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Clone for InMemoryGateway {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StoreGateway for InMemoryGateway {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        self.ensure_open()?;
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.ensure_open()?;
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.ensure_open()?;
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, GatewayError> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
