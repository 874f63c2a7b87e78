//! Anchor paths
//!
//! A [`Path`] names a node in the anchor tree as an ordered list of segments.
//! The textual form is slash-delimited with a mandatory leading slash; the
//! root is written `/`. Segments are never empty and never contain a slash,
//! so `Path::from_str(&p.to_string()) == Ok(p)` holds for every path.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;

use crate::runtime::error::{RuntimeError, RuntimeResult};

pub const SEPARATOR: char = '/';

/// Immutable, cheaply clonable sequence of path segments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    segments: Arc<[String]>,
}

impl Path {
    /// The namespace root (`/`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from segments, rejecting empty segments and segments
    /// that contain the separator.
    pub fn new<I, S>(segments: I) -> RuntimeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for segment in &segments {
            validate_segment(segment).map_err(|reason| RuntimeError::InvalidPath {
                path: format!("/{}", segments.join("/")),
                reason,
            })?;
        }
        Ok(Self {
            segments: segments.into(),
        })
    }

    /// Parses the textual form. Equivalent to `str::parse`.
    pub fn parse(text: &str) -> RuntimeResult<Self> {
        text.parse()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].into(),
        })
    }

    /// Concatenates `other` onto this path. Associative, with the root as
    /// identity on both sides.
    pub fn join(&self, other: &Path) -> Path {
        if other.is_root() {
            return self.clone();
        }
        if self.is_root() {
            return other.clone();
        }
        Self {
            segments: self
                .segments
                .iter()
                .chain(other.segments.iter())
                .cloned()
                .collect(),
        }
    }

    /// Appends a single child segment.
    pub fn child(&self, segment: &str) -> RuntimeResult<Path> {
        Ok(self.join(&Path::new([segment])?))
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("empty path segment".to_string());
    }
    if segment.contains(SEPARATOR) {
        return Err(format!("segment '{}' contains '{}'", segment, SEPARATOR));
    }
    Ok(())
}

impl FromStr for Path {
    type Err = RuntimeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RuntimeError::InvalidPath {
            path: text.to_string(),
            reason: reason.to_string(),
        };

        let rest = text
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| invalid("absolute path must start with '/'"))?;
        if rest.is_empty() {
            return Ok(Path::root());
        }

        let segments: Vec<String> = rest.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid("path segments must not be empty"));
        }
        Ok(Self {
            segments: segments.into(),
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        write!(f, "/{}", self.segments.iter().join("/"))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_round_trips() {
        let root: Path = "/".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn rejects_relative_and_empty_segments() {
        assert!(Path::parse("a/b").is_err());
        assert!(Path::parse("").is_err());
        assert!(Path::parse("/a//b").is_err());
        assert!(Path::parse("/a/").is_err());
        assert!(Path::new(["a", ""]).is_err());
        assert!(Path::new(["a/b"]).is_err());
    }

    #[test]
    fn join_and_parent() {
        let ab = Path::parse("/a/b").unwrap();
        let c = Path::parse("/c").unwrap();
        let abc = ab.join(&c);
        assert_eq!(abc.to_string(), "/a/b/c");
        assert_eq!(abc.parent(), Some(ab.clone()));
        assert_eq!(abc.name(), Some("c"));
        assert!(abc.starts_with(&ab));
        assert_eq!(Path::root().join(&ab), ab);
        assert_eq!(ab.join(&Path::root()), ab);
    }

    #[test]
    fn child_validates_segment() {
        let a = Path::parse("/a").unwrap();
        assert_eq!(a.child("b").unwrap().to_string(), "/a/b");
        assert!(a.child("").is_err());
    }
}
