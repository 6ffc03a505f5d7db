//! The gateway trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::GatewayError;

/// Async access to a flat key-value store.
///
/// Keys are opaque strings and values are already-encoded text. Methods take
/// `&self` because the sync bridge runs several operations concurrently
/// against one gateway; implementations synchronize internally.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn StoreGateway>`.
///
/// # Example
///
/// ```rust,ignore
/// use kvdict_gateway::{GatewayError, StoreGateway};
///
/// async fn rename(gw: &dyn StoreGateway, from: &str, to: &str) -> Result<(), GatewayError> {
///     if let Some(value) = gw.get(from).await? {
///         gw.set(to, &value).await?;
///         gw.delete(from).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Read the encoded value stored at `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The key does not exist (not an error condition).
    /// * `Ok(Some(value))` - The encoded value.
    /// * `Err(GatewayError)` - A transport or system error occurred.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Store an encoded value at `key`, overwriting unconditionally.
    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;

    /// Delete `key`. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), GatewayError>;

    /// List every key whose string begins with `prefix`.
    ///
    /// Callers must not assume any ordering.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, GatewayError>;

    /// Release network resources. Must be idempotent.
    async fn close(&self) -> Result<(), GatewayError>;
}

// Blanket implementations for shared pointers and boxes

#[async_trait]
impl<T: StoreGateway + ?Sized> StoreGateway for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.as_ref().set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.as_ref().delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, GatewayError> {
        self.as_ref().list_keys(prefix).await
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.as_ref().close().await
    }
}

#[async_trait]
impl<T: StoreGateway + ?Sized> StoreGateway for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.as_ref().set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.as_ref().delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, GatewayError> {
        self.as_ref().list_keys(prefix).await
    }

    async fn close(&self) -> Result<(), GatewayError> {
        self.as_ref().close().await
    }
}
