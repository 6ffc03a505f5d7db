//! kvdict core: the nested-key mapping engine.
//!
//! This layer gives structure to the flat strings of the gateway layer:
//! - `LogicalPath`: validated sequence of name segments
//! - `KeyCodec`: logical path <-> physical key under an entry point
//! - `Value`: the tree-shaped data that lives at a path
//! - `PrefixIndex`: transient trie used to rebuild subtrees from flat leaves
//! - `resolve`: the merge policy for a path that is both a leaf and a parent
//! - `ValueCodec`: value <-> wire text (`JsonCodec` by default)
//!
//! Nothing here touches the network. Every function is a pure transformation
//! over data that the caller already fetched.
//!
//! # Example
//!
//! ```rust
//! use kvdict_core::{KeyCodec, PrefixIndex, Value};
//!
//! let codec = KeyCodec::new("ep", ":").unwrap();
//! let leaves = [
//!     ("ep:a:b", Value::from(1)),
//!     ("ep:a:c", Value::from("x")),
//! ]
//! .into_iter()
//! .map(|(key, value)| (codec.decode(key).unwrap(), value));
//!
//! let index = PrefixIndex::build(leaves);
//! let a = index.reconstruct(&kvdict_core::path!["a"]).unwrap();
//! assert_eq!(a, Value::from(serde_json::json!({"b": 1, "c": "x"})));
//! ```

mod codec;
mod convert;
mod flatten;
mod index;
mod key_codec;
mod path;
mod resolve;
mod value;

pub use codec::{CodecError, FnCodec, JsonCodec, ValueCodec};
pub use convert::{from_value, json_to_value, to_value, value_to_json};
pub use flatten::flatten;
pub use index::PrefixIndex;
pub use key_codec::KeyCodec;
pub use path::{LogicalPath, PathError, SENTINEL_KEY};
pub use resolve::{deep_merge, resolve};
pub use value::Value;
