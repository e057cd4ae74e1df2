//! Dotted module paths
//!
//! Provides [`ModulePath`], the importable name of a generated source file
//! (`app/models/widget.py` → `app.models.widget`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Dotted module path
///
/// # Examples
/// - `["app", "models", "widget"]` → `app.models.widget`
/// - `["app", "api", "endpoints"]` → `app.api.endpoints` (a package)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Derive the module path of a `.py` file path
    ///
    /// `__init__.py` maps to its package.
    ///
    /// # Errors
    /// Returns error if the path is not a Python source file or has
    /// segments that are not identifiers
    pub fn from_file_path(path: &str) -> Result<Self, PathError> {
        let stem = path
            .strip_suffix(".py")
            .ok_or_else(|| PathError::NotPythonFile(path.to_string()))?;
        let mut segments: Vec<&str> = stem.split('/').filter(|s| !s.is_empty()).collect();
        if segments.last() == Some(&"__init__") {
            segments.pop();
        }
        segments.join(".").parse()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First segment (the top-level package)
    #[inline]
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Check if this path is a prefix of another
    ///
    /// # Examples
    /// - `app.models` is prefix of `app.models.widget`
    /// - `app.models` is NOT prefix of `app.modelsx`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is a package of another (strict prefix)
    #[inline]
    #[must_use]
    pub fn is_package_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }
}

impl Display for ModulePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for ModulePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = s
            .split('.')
            .map(|seg| {
                if crate::resource::is_identifier(seg) {
                    Ok(seg.to_string())
                } else {
                    Err(PathError::InvalidSegment(seg.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl TryFrom<String> for ModulePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModulePath> for String {
    fn from(value: ModulePath) -> Self {
        value.to_string()
    }
}

/// Module path errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// No segments
    #[error("empty module path")]
    Empty,

    /// Segment is not an identifier
    #[error("invalid module segment: '{0}'")]
    InvalidSegment(String),

    /// File path does not end in `.py`
    #[error("not a python source file: {0}")]
    NotPythonFile(String),
}
