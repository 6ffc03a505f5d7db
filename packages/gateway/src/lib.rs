//! kvdict gateway: the flat key-value contract.
//!
//! This is the narrow waist between the nested mapping engine and whatever
//! remote store actually holds the data. Everything at this level is flat:
//! keys are plain strings, values are already-encoded text. No path
//! splitting, no structure, no codec.
//!
//! Concrete adapters (Redis, JetStream KV, SQL tables, ...) implement
//! [`StoreGateway`] in their own crates. This crate ships only
//! [`InMemoryGateway`], which is both the reference adapter and the test
//! double used throughout the workspace.
//!
//! # Example
//!
//! ```rust
//! use kvdict_gateway::{InMemoryGateway, StoreGateway};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), kvdict_gateway::GatewayError> {
//! let gateway = InMemoryGateway::new();
//! gateway.set("ep:user:name", "\"alice\"").await?;
//!
//! assert_eq!(gateway.list_keys("ep:").await?, vec!["ep:user:name".to_string()]);
//! # Ok(())
//! # }
//! ```

mod error;
mod in_memory;
mod traits;

pub use error::GatewayError;
pub use in_memory::InMemoryGateway;
pub use traits::StoreGateway;
