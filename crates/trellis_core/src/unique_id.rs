//! Hierarchical unique identifiers.
//!
//! A unique id has the textual form `engine:segment/segment/...`. The engine part names the engine that
//! discovered the node; every further segment is the canonical name of one tree level (qualified class
//! name, method signature with parameter types, `[n]` for dynamic tests). The form is stable between
//! discovery and execution so a unique-id selector round-trips.
//!
//! Segments may contain any text. In the textual form a `/` inside a segment is written `%2F` and a `%`
//! is written `%25`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separates the engine id from the first segment.
pub const ENGINE_SEPARATOR: char = ':';
/// Separates consecutive segments.
pub const SEGMENT_SEPARATOR: char = '/';

const ESCAPED_SEPARATOR: &str = "%2F";
const ESCAPED_PERCENT: &str = "%25";

/// Errors produced when parsing a unique id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UniqueIdError {
    #[error("unique id '{0}' has no engine prefix (expected 'engine:segment/...')")]
    MissingEngine(String),

    #[error("unique id '{0}' has an empty engine id")]
    EmptyEngine(String),

    #[error("unique id '{0}' has an engine id containing '/'")]
    InvalidEngine(String),

    #[error("unique id '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// A stable, hierarchical identifier for a test descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId {
    engine: String,
    segments: Vec<String>,
}

impl UniqueId {
    /// Create the id of an engine root.
    pub fn for_engine(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            segments: Vec::new(),
        }
    }

    /// Parse the textual form.
    ///
    /// `engine` alone (with or without a trailing `:`) denotes the engine root.
    pub fn parse(text: &str) -> Result<Self, UniqueIdError> {
        let Some((engine, rest)) = text.split_once(ENGINE_SEPARATOR) else {
            if text.is_empty() {
                return Err(UniqueIdError::MissingEngine(text.to_string()));
            }
            if text.contains(SEGMENT_SEPARATOR) {
                return Err(UniqueIdError::MissingEngine(text.to_string()));
            }
            return Ok(Self::for_engine(text));
        };

        if engine.is_empty() {
            return Err(UniqueIdError::EmptyEngine(text.to_string()));
        }
        if engine.contains(SEGMENT_SEPARATOR) {
            return Err(UniqueIdError::InvalidEngine(text.to_string()));
        }
        if rest.is_empty() {
            return Ok(Self::for_engine(engine));
        }

        let mut segments = Vec::new();
        for segment in rest.split(SEGMENT_SEPARATOR) {
            if segment.trim().is_empty() {
                return Err(UniqueIdError::EmptySegment(text.to_string()));
            }
            segments.push(unescape(segment));
        }

        Ok(Self {
            engine: engine.to_string(),
            segments,
        })
    }

    /// Return a new id with `segment` appended.
    ///
    /// A `/` in `segment` belongs to the segment and is escaped in the textual form.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        debug_assert!(!segment.trim().is_empty(), "unique id segments must not be blank");
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            engine: self.engine.clone(),
            segments,
        }
    }

    /// The id one level up, or `None` for an engine root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            engine: self.engine.clone(),
            segments,
        })
    }

    pub fn engine_id(&self) -> &str {
        &self.engine
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_engine_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &UniqueId) -> bool {
        self.engine == other.engine
            && self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.engine)?;
        if !self.segments.is_empty() {
            write!(f, "{ENGINE_SEPARATOR}")?;
            for (index, segment) in self.segments.iter().enumerate() {
                if index > 0 {
                    write!(f, "{SEGMENT_SEPARATOR}")?;
                }
                write!(f, "{}", escape(segment))?;
            }
        }
        Ok(())
    }
}

fn escape(segment: &str) -> String {
    segment.replace('%', ESCAPED_PERCENT).replace(SEGMENT_SEPARATOR, ESCAPED_SEPARATOR)
}

/// Undo [`escape`]; any other `%` sequence is kept as written.
fn unescape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(position) = rest.find('%') {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];
        if tail.starts_with(ESCAPED_SEPARATOR) {
            out.push(SEGMENT_SEPARATOR);
            rest = &tail[ESCAPED_SEPARATOR.len()..];
        } else if tail.starts_with(ESCAPED_PERCENT) {
            out.push('%');
            rest = &tail[ESCAPED_PERCENT.len()..];
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

impl FromStr for UniqueId {
    type Err = UniqueIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_root_display() {
        let id = UniqueId::for_engine("trellis");
        assert_eq!(id.to_string(), "trellis");
        assert!(id.is_engine_root());
        assert_eq!(id.parent(), None);
    }

    #[test]
    fn test_append_and_display() {
        let id = UniqueId::for_engine("trellis")
            .append("com.example.CalculatorTests")
            .append("adds(i32, i32)");
        assert_eq!(id.to_string(), "trellis:com.example.CalculatorTests/adds(i32, i32)");
        assert_eq!(id.last_segment(), Some("adds(i32, i32)"));
    }

    #[test]
    fn test_parse_round_trip() {
        let text = "trellis:com.example.Outer/com.example.Outer.Inner/check()";
        let id = UniqueId::parse(text).unwrap();
        assert_eq!(id.engine_id(), "trellis");
        assert_eq!(id.segments().len(), 3);
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn test_parse_engine_only() {
        assert_eq!(UniqueId::parse("trellis").unwrap(), UniqueId::for_engine("trellis"));
        assert_eq!(UniqueId::parse("trellis:").unwrap(), UniqueId::for_engine("trellis"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(UniqueId::parse(""), Err(UniqueIdError::MissingEngine(_))));
        assert!(matches!(UniqueId::parse("a/b"), Err(UniqueIdError::MissingEngine(_))));
        assert!(matches!(UniqueId::parse(":a"), Err(UniqueIdError::EmptyEngine(_))));
        assert!(matches!(UniqueId::parse("e:a//b"), Err(UniqueIdError::EmptySegment(_))));
        assert!(matches!(UniqueId::parse("e/x:a"), Err(UniqueIdError::InvalidEngine(_))));
    }

    #[test]
    fn test_separator_inside_segment_round_trips() {
        let id = UniqueId::for_engine("trellis")
            .append("demo.Paths")
            .append("reads(a/b, 100%)");
        assert_eq!(id.to_string(), "trellis:demo.Paths/reads(a%2Fb, 100%25)");

        let parsed = UniqueId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.last_segment(), Some("reads(a/b, 100%)"));
        assert_eq!(parsed.parent().unwrap().segments(), ["demo.Paths"]);
    }

    #[test]
    fn test_unknown_percent_sequences_are_literal() {
        let id = UniqueId::parse("e:50%off").unwrap();
        assert_eq!(id.last_segment(), Some("50%off"));
        assert_eq!(UniqueId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parent_and_prefix() {
        let class = UniqueId::for_engine("trellis").append("a.B");
        let method = class.append("m()");
        assert_eq!(method.parent().as_ref(), Some(&class));
        assert!(class.is_prefix_of(&method));
        assert!(!method.is_prefix_of(&class));
        assert!(!UniqueId::for_engine("other").is_prefix_of(&method));
    }
}
