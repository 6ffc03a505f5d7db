//! kvdict: a nested, mapping-like view over a flat key-value store.
//!
//! Keys in the store are hierarchical paths joined by a separator under an
//! entry point (`ep1:main:sup1:key`). [`NestedMapping`] presents them as a
//! map from top-level names to structured values, splitting records into
//! one key per leaf on write and rebuilding them on read.
//!
//! The stack, top down:
//! - [`NestedMapping`]: blocking mapping API plus write-through proxies
//! - [`SyncBridge`]: a worker thread that runs the async gateway calls
//! - [`StoreGateway`]: the flat async backend contract
//!
//! Path handling, reconstruction and value codecs live in `kvdict-core` and
//! are re-exported here.
//!
//! # Example
//!
//! ```rust
//! use kvdict::{InMemoryGateway, MappingOptions, NestedMapping, Value};
//! use serde_json::json;
//!
//! let mapping = NestedMapping::new(InMemoryGateway::new(), MappingOptions::new("ep1"))?;
//!
//! mapping.set("a", Value::from(json!({"b": {"x": 1}})))?;
//! assert_eq!(mapping.get_value("a")?, Value::from(json!({"b": {"x": 1}})));
//!
//! mapping.delete("a")?;
//! assert!(mapping.is_empty()?);
//! # Ok::<(), kvdict::Error>(())
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and installs no subscriber. Bridge
//! lifecycle and per-operation counts are at `debug`, individual leaf writes
//! at `trace`, gateway close failures at `warn`.

mod bridge;
mod error;
mod mapping;
mod options;
mod proxy;

pub use bridge::{BridgeState, GatewayHandle, SyncBridge};
pub use error::{Error, Result};
pub use mapping::{Keys, NestedMapping};
pub use options::{MappingBuilder, MappingOptions, DEFAULT_SEPARATOR, DEFAULT_WORKER_NAME};
pub use proxy::{Item, ListProxy, MapProxy};

// Re-export the lower layers for convenience
pub use kvdict_core::{
    from_value, path, to_value, CodecError, FnCodec, JsonCodec, KeyCodec, LogicalPath, PathError,
    Value, ValueCodec, SENTINEL_KEY,
};
pub use kvdict_gateway::{GatewayError, InMemoryGateway, StoreGateway};
