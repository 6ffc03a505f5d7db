//! Error types for the mapping facade.

use std::time::Duration;

use kvdict_core::{CodecError, PathError};
use kvdict_gateway::GatewayError;
use thiserror::Error;

/// Errors surfaced by [`NestedMapping`](crate::NestedMapping) and its proxies.
#[derive(Debug, Error)]
pub enum Error {
    /// A key or path was rejected, or a stored key did not parse.
    #[error(transparent)]
    Path(#[from] PathError),

    /// The mapping was configured with unusable options.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Nothing is stored at or below the top-level key.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// A value could not be encoded, or a stored payload could not be decoded.
    ///
    /// `payload` is the raw stored text for decode failures and empty for
    /// encode failures.
    #[error("codec failure at '{key}': {message}")]
    Encoding {
        key: String,
        payload: String,
        message: String,
    },

    /// The gateway reported a failure.
    #[error("backend error: {0}")]
    Backend(#[from] GatewayError),

    /// The caller stopped waiting. The operation may still complete.
    #[error("operation timed out after {after:?}")]
    Timeout { after: Duration },

    /// The bridge is stopped, or stopped while the operation was in flight.
    #[error("bridge closed")]
    BridgeClosed,

    /// The bridge worker could not be started.
    #[error("bridge startup failed: {0}")]
    Startup(#[source] std::io::Error),

    /// A proxy's location no longer holds the expected shape.
    #[error("proxy for '{key}': {message}")]
    Proxy { key: String, message: String },
}

impl Error {
    pub(crate) fn decoding(key: &str, payload: String, err: CodecError) -> Self {
        Error::Encoding {
            key: key.to_string(),
            payload,
            message: err.to_string(),
        }
    }

    pub(crate) fn encoding(key: &str, err: CodecError) -> Self {
        Error::Encoding {
            key: key.to_string(),
            payload: String::new(),
            message: err.to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, Error>;
