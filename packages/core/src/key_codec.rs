//! Translation between logical paths and physical keys.

use crate::path::{LogicalPath, PathError, SENTINEL_KEY};

/// Maps logical paths to flat backend keys under one entry point.
///
/// A physical key is `entry_point + sep + seg₁ + sep + … + segₙ`. Segments
/// containing the separator are rejected at encode time rather than
/// escaped, which keeps `decode(encode(p)) == p` for every accepted path.
///
/// # Example
///
/// ```rust
/// use kvdict_core::{path, KeyCodec};
///
/// let codec = KeyCodec::new("ep1", ":").unwrap();
/// assert_eq!(codec.encode(&path!["main", "sup1"]).unwrap(), "ep1:main:sup1");
/// assert_eq!(codec.decode("ep1:main:sup1").unwrap(), path!["main", "sup1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    entry_point: String,
    separator: String,
    prefix: String,
}

impl KeyCodec {
    /// Create a codec for `entry_point` using `separator` between segments.
    pub fn new(
        entry_point: impl Into<String>,
        separator: impl Into<String>,
    ) -> Result<Self, PathError> {
        let entry_point = entry_point.into();
        let separator = separator.into();

        if entry_point.is_empty() {
            return Err(PathError::InvalidNamespace {
                message: "entry point must not be empty".to_string(),
            });
        }
        if separator.is_empty() {
            return Err(PathError::InvalidNamespace {
                message: "separator must not be empty".to_string(),
            });
        }
        if entry_point.contains(&separator) {
            return Err(PathError::InvalidNamespace {
                message: format!(
                    "entry point '{}' must not contain separator '{}'",
                    entry_point, separator
                ),
            });
        }

        let prefix = format!("{}{}", entry_point, separator);
        Ok(Self {
            entry_point,
            separator,
            prefix,
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// `entry_point + separator`; every key of this namespace starts with it.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `name` can be used as a segment with this codec.
    pub fn is_valid_segment(&self, name: &str) -> bool {
        !name.is_empty() && name != SENTINEL_KEY && !name.contains(&self.separator)
    }

    /// Join a logical path into its physical key.
    pub fn encode(&self, path: &LogicalPath) -> Result<String, PathError> {
        for (position, segment) in path.segments().iter().enumerate() {
            if segment.contains(&self.separator) {
                return Err(PathError::InvalidSegment {
                    segment: segment.clone(),
                    position,
                    message: format!("contains separator '{}'", self.separator),
                });
            }
        }
        Ok(format!(
            "{}{}",
            self.prefix,
            path.segments().join(&self.separator)
        ))
    }

    /// Physical key of a top-level name.
    pub fn encode_top(&self, name: &str) -> Result<String, PathError> {
        self.encode(&LogicalPath::single(name)?)
    }

    /// Whether a physical key belongs to this entry point.
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Split a physical key back into its logical path.
    ///
    /// A single trailing separator is tolerated and ignored; any other empty
    /// segment makes the key malformed, as does a top-level `_value`, which
    /// no caller could look up. Deeper `_value` segments are accepted.
    pub fn decode(&self, key: &str) -> Result<LogicalPath, PathError> {
        let relative = key
            .strip_prefix(&self.prefix)
            .ok_or_else(|| PathError::NamespaceMismatch {
                key: key.to_string(),
                prefix: self.prefix.clone(),
            })?;

        let mut segments: Vec<String> = relative
            .split(self.separator.as_str())
            .map(str::to_string)
            .collect();
        if segments.len() > 1 && segments.last().is_some_and(String::is_empty) {
            segments.pop();
        }

        if segments.iter().any(String::is_empty) {
            let message = if relative.is_empty() {
                "nothing after the entry point".to_string()
            } else {
                "empty segment".to_string()
            };
            return Err(PathError::MalformedKey {
                key: key.to_string(),
                message,
            });
        }
        if segments[0] == SENTINEL_KEY {
            return Err(PathError::MalformedKey {
                key: key.to_string(),
                message: format!("top-level name '{}' is reserved", SENTINEL_KEY),
            });
        }

        Ok(LogicalPath::from_stored(segments))
    }

    /// Whether `key` is `base` itself or lies strictly beneath it.
    ///
    /// `list_keys` matches on raw string prefixes, so listing `ep:user` also
    /// returns `ep:users`; this filters such siblings out.
    pub fn is_within(&self, key: &str, base: &str) -> bool {
        match key.strip_prefix(base) {
            Some("") => true,
            Some(rest) => rest.starts_with(&self.separator),
            None => false,
        }
    }
}
