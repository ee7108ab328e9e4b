//! Hierarchical entity paths: namespaces and action name filters.
//!
//! Both are kept as ordered segment lists so that prefix and equality checks
//! are plain segment comparisons.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest permitted path segment.
pub const MAX_SEGMENT_LENGTH: usize = 256;

/// Most segments a name filter may carry (`package/name`).
pub const MAX_NAME_SEGMENTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,

    #[error("invalid path segment '{0}'")]
    InvalidSegment(String),

    #[error("expected at most {max} segments but found {found}")]
    TooManySegments { found: usize, max: usize },
}

/// Whether `segment` is a well-formed entity name.
///
/// First character alphanumeric or `_`; the rest may also contain `@`, `.`,
/// `-` and spaces; no trailing space.
pub fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > MAX_SEGMENT_LENGTH || segment.ends_with(' ') {
        return false;
    }
    let mut chars = segment.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '.' | '-' | ' '))
}

fn split_segments(value: &str) -> Result<Vec<String>, PathError> {
    if value.is_empty() {
        return Err(PathError::Empty);
    }
    value
        .split('/')
        .map(|segment| {
            if is_valid_segment(segment) {
                Ok(segment.to_string())
            } else {
                Err(PathError::InvalidSegment(segment.to_string()))
            }
        })
        .collect()
}

/// An owning namespace: subject, then optional package and nested path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    pub fn parse(value: &str) -> Result<Self, PathError> {
        Ok(Self {
            segments: split_segments(value)?,
        })
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if let Some(bad) = segments.iter().find(|s| !is_valid_segment(s)) {
            return Err(PathError::InvalidSegment(bad.clone()));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The subject owning this namespace (first segment).
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// True when `self` equals `ancestor` or is nested below it.
    pub fn is_within(&self, ancestor: &Namespace) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl TryFrom<String> for Namespace {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}

/// Action name filter: `name` or `package/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameFilter {
    segments: Vec<String>,
}

impl NameFilter {
    pub fn parse(value: &str) -> Result<Self, PathError> {
        let segments = split_segments(value)?;
        if segments.len() > MAX_NAME_SEGMENTS {
            return Err(PathError::TooManySegments {
                found: segments.len(),
                max: MAX_NAME_SEGMENTS,
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn package(&self) -> Option<&str> {
        (self.segments.len() == MAX_NAME_SEGMENTS).then(|| self.segments[0].as_str())
    }

    pub fn name(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Exact segment-wise match against a record's qualified name.
    pub fn matches(&self, qualified_name: &[String]) -> bool {
        self.segments == qualified_name
    }
}

impl fmt::Display for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Segments naming an action relative to the namespace that owns its
/// activation.
///
/// The `path` annotation carries the fully qualified action path; the owning
/// namespace is stripped from its front when present. Without the
/// annotation the action is unpackaged and only its name remains.
pub fn qualified_name(namespace: &Namespace, name: &str, path: Option<&str>) -> Vec<String> {
    match path {
        Some(path) => {
            let segments: Vec<String> = path.split('/').map(str::to_string).collect();
            match segments.strip_prefix(namespace.segments()) {
                Some(rest) if !rest.is_empty() => rest.to_vec(),
                _ => segments,
            }
        }
        None => vec![name.to_string()],
    }
}
