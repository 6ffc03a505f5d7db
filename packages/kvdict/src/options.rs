//! Mapping configuration.

use std::sync::Arc;
use std::time::Duration;

use kvdict_core::{JsonCodec, KeyCodec, PathError, ValueCodec};
use kvdict_gateway::StoreGateway;

use crate::error::{Error, Result};
use crate::mapping::NestedMapping;

/// Separator used when none is configured.
pub const DEFAULT_SEPARATOR: &str = ":";

/// Worker thread name used when none is configured.
pub const DEFAULT_WORKER_NAME: &str = "kvdict-bridge";

/// Configuration for a [`NestedMapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOptions {
    /// Namespace prefix shared by every physical key of the mapping.
    pub entry_point: String,

    /// Joins the entry point and path segments into physical keys.
    pub separator: String,

    /// Default deadline for each blocking operation. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Name of the bridge worker thread.
    pub worker_name: String,
}

impl MappingOptions {
    /// Options for `entry_point` with every other field at its default.
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            timeout: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Check the options and derive the key codec they describe.
    pub fn validate(&self) -> Result<KeyCodec> {
        if self.worker_name.contains('\0') {
            return Err(Error::config("worker name must not contain NUL"));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::config("timeout must be greater than zero"));
        }
        KeyCodec::new(self.entry_point.as_str(), self.separator.as_str()).map_err(|err| match err {
            PathError::InvalidNamespace { message } => Error::InvalidConfig { message },
            other => Error::Path(other),
        })
    }
}

/// Step-by-step construction of a [`NestedMapping`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use kvdict::{InMemoryGateway, NestedMapping, Value};
///
/// let mapping = NestedMapping::builder(InMemoryGateway::new())
///     .entry_point("app")
///     .separator("/")
///     .timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// mapping.set("greeting", "hello").unwrap();
/// assert_eq!(mapping.get_value("greeting").unwrap(), Value::from("hello"));
/// ```
pub struct MappingBuilder {
    gateway: Arc<dyn StoreGateway>,
    entry_point: Option<String>,
    separator: String,
    timeout: Option<Duration>,
    worker_name: String,
    codec: Option<Box<dyn ValueCodec>>,
}

impl MappingBuilder {
    pub(crate) fn new(gateway: Arc<dyn StoreGateway>) -> Self {
        Self {
            gateway,
            entry_point: None,
            separator: DEFAULT_SEPARATOR.to_string(),
            timeout: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            codec: None,
        }
    }

    /// Required.
    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Replace the default [`JsonCodec`].
    pub fn codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    /// Take every field from `options`.
    pub fn options(mut self, options: MappingOptions) -> Self {
        self.entry_point = Some(options.entry_point);
        self.separator = options.separator;
        self.timeout = options.timeout;
        self.worker_name = options.worker_name;
        self
    }

    /// Validate the configuration and start the mapping's bridge.
    pub fn build(self) -> Result<NestedMapping> {
        let entry_point = self
            .entry_point
            .ok_or_else(|| Error::config("entry point is required"))?;
        let options = MappingOptions {
            entry_point,
            separator: self.separator,
            timeout: self.timeout,
            worker_name: self.worker_name,
        };
        let codec = self.codec.unwrap_or_else(|| Box::new(JsonCodec));
        NestedMapping::start(self.gateway, options, codec)
    }
}

impl std::fmt::Debug for MappingBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingBuilder")
            .field("entry_point", &self.entry_point)
            .field("separator", &self.separator)
            .field("timeout", &self.timeout)
            .field("worker_name", &self.worker_name)
            .finish_non_exhaustive()
    }
}
