//! Package versions and version vertices
//!
//! A version is an ordered tuple of numeric segments (`major.minor.build.revision`).
//! A vertex is a single comparison predicate against such a version.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of segments in a version (`major.minor.build.revision`)
pub const MAX_SEGMENTS: usize = 4;

/// Errors that can occur while parsing versions and vertices
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    /// Invalid version format
    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    /// Unknown comparison operator
    #[error("Invalid comparator: {0}")]
    InvalidComparator(String),
}

/// Package version
///
/// Comparison is lexicographic over the segments, with missing trailing
/// segments treated as zero: `1.0` == `1.0.0` < `1.0.0.1` < `1.1`.
/// The segments are kept as written so that `Display` reproduces the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Create a version from its segments
    ///
    /// An empty segment list is treated as `0`.
    pub fn new(segments: impl Into<Vec<u64>>) -> Self {
        let mut segments = segments.into();
        if segments.is_empty() {
            segments.push(0);
        }
        Version { segments }
    }

    /// Parse a version string such as `1.2` or `2.0.1.15`
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::InvalidVersion("empty version".to_string()));
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > MAX_SEGMENTS {
            return Err(VersionError::InvalidVersion(format!(
                "Expected at most {} segments, got '{}'",
                MAX_SEGMENTS, s
            )));
        }

        let segments = parts
            .iter()
            .map(|part| {
                let invalid =
                    || VersionError::InvalidVersion(format!("Invalid segment '{}' in '{}'", part, s));
                // u64::from_str alone would accept a leading '+'
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Version { segments })
    }

    /// Segments as written
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Segment at `index`, zero when absent
    pub fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    pub fn major(&self) -> u64 {
        self.segment(0)
    }

    pub fn minor(&self) -> u64 {
        self.segment(1)
    }

    /// Segments without trailing zeros; equal versions share this form.
    fn significant(&self) -> &[u64] {
        let len = self
            .segments
            .iter()
            .rposition(|s| *s != 0)
            .map_or(0, |i| i + 1);
        &self.segments[..len]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

/// A single version comparison predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "version", rename_all = "snake_case")]
pub enum VersionVertex {
    /// Matches every version
    Any,

    /// Strictly greater than (> 1.0)
    GreaterThan(Version),

    /// Greater than or equal (>= 1.0)
    GreaterThanOrEqual(Version),

    /// Exact version (= 1.0)
    Exact(Version),

    /// Strictly less than (< 2.0)
    LessThan(Version),
}

impl VersionVertex {
    /// Build a vertex from a comparator token and a version token
    ///
    /// Comparator symbols are matched exactly: `>`, `>=`, `=`, `<`.
    pub fn parse(comparator: &str, version: &str) -> Result<Self, VersionError> {
        let build: fn(Version) -> VersionVertex = match comparator {
            ">" => VersionVertex::GreaterThan,
            ">=" => VersionVertex::GreaterThanOrEqual,
            "=" => VersionVertex::Exact,
            "<" => VersionVertex::LessThan,
            other => return Err(VersionError::InvalidComparator(other.to_string())),
        };
        Ok(build(Version::parse(version)?))
    }

    /// Check if a version satisfies this vertex
    pub fn matches(&self, candidate: &Version) -> bool {
        match self {
            VersionVertex::Any => true,
            VersionVertex::GreaterThan(v) => candidate > v,
            VersionVertex::GreaterThanOrEqual(v) => candidate >= v,
            VersionVertex::Exact(v) => candidate == v,
            VersionVertex::LessThan(v) => candidate < v,
        }
    }

    /// Comparator symbol, `None` for [`VersionVertex::Any`]
    pub fn comparator(&self) -> Option<&'static str> {
        match self {
            VersionVertex::Any => None,
            VersionVertex::GreaterThan(_) => Some(">"),
            VersionVertex::GreaterThanOrEqual(_) => Some(">="),
            VersionVertex::Exact(_) => Some("="),
            VersionVertex::LessThan(_) => Some("<"),
        }
    }

    /// Version operand, `None` for [`VersionVertex::Any`]
    pub fn version(&self) -> Option<&Version> {
        match self {
            VersionVertex::Any => None,
            VersionVertex::GreaterThan(v)
            | VersionVertex::GreaterThanOrEqual(v)
            | VersionVertex::Exact(v)
            | VersionVertex::LessThan(v) => Some(v),
        }
    }
}

impl fmt::Display for VersionVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.comparator(), self.version()) {
            (Some(op), Some(v)) => write!(f, "{} {}", op, v),
            _ => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.segments(), &[1, 2, 3]);
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.segment(3), 0);
    }

    #[test]
    fn test_parse_four_segments() {
        let v = Version::parse("2.0.1.15").unwrap();
        assert_eq!(v.segments(), &[2, 0, 1, 15]);
        assert_eq!(v.to_string(), "2.0.1.15");
    }

    #[test]
    fn test_parse_invalid_versions() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.x").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("-1.0").is_err());
        assert!(Version::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        let a = Version::parse("1.0").unwrap();
        let b = Version::parse("1.0.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::new([1, 0]) < Version::new([2, 0]));
        assert!(Version::new([1, 2]) < Version::new([1, 10]));
        assert!(Version::new([1, 0, 0]) < Version::new([1, 0, 0, 1]));
        assert!(Version::new([1, 9, 9, 9]) < Version::new([2]));
    }

    #[test]
    fn test_display_keeps_segments() {
        assert_eq!(Version::parse("1.0").unwrap().to_string(), "1.0");
        assert_eq!(Version::new(Vec::new()).to_string(), "0");
    }

    #[test]
    fn test_vertex_parse() {
        assert_eq!(
            VersionVertex::parse(">=", "1.0").unwrap(),
            VersionVertex::GreaterThanOrEqual(Version::new([1, 0]))
        );
        assert!(matches!(
            VersionVertex::parse("<=", "1.0"),
            Err(VersionError::InvalidComparator(_))
        ));
        assert!(matches!(
            VersionVertex::parse(">", "one"),
            Err(VersionError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_vertex_matches_boundary() {
        let v = Version::new([1, 4, 2]);
        assert!(VersionVertex::Exact(v.clone()).matches(&v));
        assert!(!VersionVertex::GreaterThan(v.clone()).matches(&v));
        assert!(VersionVertex::GreaterThanOrEqual(v.clone()).matches(&v));
        assert!(!VersionVertex::LessThan(v.clone()).matches(&v));
        assert!(VersionVertex::Any.matches(&v));
    }

    #[test]
    fn test_vertex_display() {
        let vertex = VersionVertex::LessThan(Version::new([2, 0]));
        assert_eq!(vertex.to_string(), "< 2.0");
        assert_eq!(VersionVertex::Any.to_string(), "any");
    }
}
