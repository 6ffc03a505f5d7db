//! Logical paths: validated sequences of name segments.

use std::fmt;

/// Reserved name used in reconstructed output to hold a stored value that
/// coexists with child paths. Never valid as a caller-supplied segment.
pub const SENTINEL_KEY: &str = "_value";

/// Errors related to logical paths and physical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A physical key does not belong to the entry point's namespace.
    NamespaceMismatch { key: String, prefix: String },
    /// A physical key inside the namespace cannot be split into segments.
    MalformedKey { key: String, message: String },
    /// A segment supplied by a caller is not usable.
    InvalidSegment {
        segment: String,
        position: usize,
        message: String,
    },
    /// A path must have at least one segment.
    EmptyPath,
    /// The entry point / separator pair is unusable.
    InvalidNamespace { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::NamespaceMismatch { key, prefix } => {
                write!(f, "key '{}' is outside namespace '{}'", key, prefix)
            }
            PathError::MalformedKey { key, message } => {
                write!(f, "malformed key '{}': {}", key, message)
            }
            PathError::InvalidSegment {
                segment,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path segment '{}' at position {}: {}",
                    segment, position, message
                )
            }
            PathError::EmptyPath => write!(f, "path must have at least one segment"),
            PathError::InvalidNamespace { message } => {
                write!(f, "invalid namespace: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A position in the logical namespace.
///
/// Segments are non-empty and never equal to [`SENTINEL_KEY`]. Whether a
/// segment may contain a given separator depends on the [`KeyCodec`]
/// in use, so that check happens at encode time.
///
/// [`KeyCodec`]: crate::KeyCodec
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// Build a path from caller-supplied segments, validating each.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kvdict_core::LogicalPath;
    ///
    /// let path = LogicalPath::new(vec!["users".into(), "alice".into()]).unwrap();
    /// assert_eq!(path.len(), 2);
    ///
    /// assert!(LogicalPath::new(vec![]).is_err());
    /// assert!(LogicalPath::new(vec!["_value".into()]).is_err());
    /// ```
    pub fn new(segments: Vec<String>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::EmptyPath);
        }
        for (i, segment) in segments.iter().enumerate() {
            Self::validate_segment(segment, i)?;
        }
        Ok(LogicalPath { segments })
    }

    /// A single-segment path, the shape of every top-level key.
    pub fn single(segment: impl Into<String>) -> Result<Self, PathError> {
        Self::new(vec![segment.into()])
    }

    /// Build from segments that came out of a stored key.
    ///
    /// Stored keys may legitimately carry the sentinel name (written by some
    /// other client), so only emptiness is checked here.
    pub(crate) fn from_stored(segments: Vec<String>) -> Self {
        debug_assert!(!segments.is_empty());
        debug_assert!(segments.iter().all(|s| !s.is_empty()));
        LogicalPath { segments }
    }

    fn validate_segment(segment: &str, position: usize) -> Result<(), PathError> {
        if segment.is_empty() {
            return Err(PathError::InvalidSegment {
                segment: segment.to_string(),
                position,
                message: "empty segment".to_string(),
            });
        }
        if segment == SENTINEL_KEY {
            return Err(PathError::InvalidSegment {
                segment: segment.to_string(),
                position,
                message: format!("'{}' is reserved", SENTINEL_KEY),
            });
        }
        Ok(())
    }

    /// Extend this path by one segment.
    pub fn join(&self, segment: impl Into<String>) -> Result<LogicalPath, PathError> {
        let segment = segment.into();
        Self::validate_segment(&segment, self.segments.len())?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(LogicalPath { segments })
    }

    /// The segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The top-level key this path lives under.
    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    /// Number of segments. Always at least one.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check if this path has the given prefix.
    pub fn has_prefix(&self, prefix: &LogicalPath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix.segments == self.segments[..prefix.segments.len()]
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl std::ops::Index<usize> for LogicalPath {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.segments[i]
    }
}

/// Macro for building logical paths from literal segments.
///
/// # Example
///
/// ```rust
/// use kvdict_core::path;
///
/// let p = path!["users", "alice", "age"];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! path {
    ($($segment:expr),+ $(,)?) => {
        $crate::LogicalPath::new(vec![$(::std::string::String::from($segment)),+])
            .expect("invalid path literal")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_segments() {
        assert!(LogicalPath::new(vec!["a".into(), "b".into()]).is_ok());
        assert_eq!(LogicalPath::new(vec![]), Err(PathError::EmptyPath));
        assert!(matches!(
            LogicalPath::new(vec!["a".into(), "".into()]),
            Err(PathError::InvalidSegment { position: 1, .. })
        ));
    }

    #[test]
    fn sentinel_rejected_anywhere() {
        let err = LogicalPath::new(vec!["a".into(), SENTINEL_KEY.into()]).unwrap_err();
        assert!(format!("{}", err).contains("reserved"));

        assert!(LogicalPath::single(SENTINEL_KEY).is_err());
        assert!(path!["a"].join(SENTINEL_KEY).is_err());
    }

    #[test]
    fn segments_may_contain_arbitrary_text() {
        let p = path!["user name", "with.dots", "名前"];
        assert_eq!(p.len(), 3);
        assert_eq!(&p[2], "名前");
    }

    #[test]
    fn join_appends() {
        let p = path!["a"].join("b").unwrap();
        assert_eq!(p, path!["a", "b"]);
        assert_eq!(p.first(), "a");
    }

    #[test]
    fn has_prefix_works() {
        let p = path!["foo", "bar", "baz"];
        assert!(p.has_prefix(&path!["foo"]));
        assert!(p.has_prefix(&path!["foo", "bar", "baz"]));
        assert!(!p.has_prefix(&path!["bar"]));
        assert!(!p.has_prefix(&path!["foo", "bar", "baz", "qux"]));
    }

    #[test]
    fn display_joins_with_slash() {
        assert_eq!(path!["a", "b"].to_string(), "a/b");
    }

    #[test]
    fn path_error_display() {
        let err = PathError::NamespaceMismatch {
            key: "ep2:x".to_string(),
            prefix: "ep1:".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("ep2:x"));
        assert!(display.contains("ep1:"));

        let err = PathError::MalformedKey {
            key: "ep:a::b".to_string(),
            message: "empty segment".to_string(),
        };
        assert!(format!("{}", err).contains("malformed key"));
    }

    #[test]
    #[should_panic(expected = "invalid path literal")]
    fn path_macro_panics_on_invalid() {
        let _ = path!["ok", ""];
    }
}
