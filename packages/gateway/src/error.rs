//! Error types for the gateway layer.
//!
//! Errors at this level are transport-focused. No semantic errors like
//! "invalid path" or "bad payload" - those belong in higher layers.

use thiserror::Error;

/// Errors surfaced by a [`StoreGateway`](crate::StoreGateway).
///
/// These are transport and resource errors only. The mapping engine never
/// retries them; retry policy belongs to the adapter or the caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Generic I/O or transport failure.
    ///
    /// Use this for network errors, connection resets, driver errors, etc.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The gateway has been closed and can no longer serve requests.
    #[error("gateway closed")]
    Closed,

    /// Backend-specific failure with a status code and message.
    ///
    /// The code is opaque to this layer; adapters define its meaning.
    #[error("backend error: code {code} - {message}")]
    Backend { code: u32, message: String },
}

impl GatewayError {
    /// Wrap any error as a transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        GatewayError::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn transport_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = GatewayError::transport(io_err);
        let display = format!("{}", err);
        assert!(display.contains("transport error"));
        assert!(display.contains("reset by peer"));
    }

    #[test]
    fn transport_error_has_source() {
        let err = GatewayError::transport(std::io::Error::other("boom"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn closed_display() {
        assert_eq!(format!("{}", GatewayError::Closed), "gateway closed");
    }

    #[test]
    fn backend_error_display() {
        let err = GatewayError::Backend {
            code: 7,
            message: "bucket missing".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("code 7"));
        assert!(display.contains("bucket missing"));
    }
}
