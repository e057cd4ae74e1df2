//! Validation issues
//!
//! Findings produced by the validator battery. Issues are immutable values;
//! the latest list is kept on the artifact's result and fed to repair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which check produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    /// Content does not parse
    Syntax,
    /// Unresolved or circular imports
    ReferenceIntegrity,
    /// Endpoint shape: router, handlers, response contracts, injection
    InterfaceConvention,
    /// Model typing idiom of the persistence layer
    DataModelConvention,
}

impl IssueCategory {
    /// Kebab-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Syntax => "syntax",
            IssueCategory::ReferenceIntegrity => "reference-integrity",
            IssueCategory::InterfaceConvention => "interface-convention",
            IssueCategory::DataModelConvention => "data-model-convention",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity; ordered most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Content cannot be accepted
    Critical,
    /// Content works but breaks a convention
    Warning,
    /// Informational only, never triggers repair
    Info,
}

impl Severity {
    /// Check if this severity requires a repair cycle
    #[inline]
    #[must_use]
    pub fn requires_repair(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => f.write_str("critical"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Producing check
    pub category: IssueCategory,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
    /// Where in the content, e.g. `line 4:12` or `import app.models.user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ValidationIssue {
    /// Create new issue
    #[inline]
    #[must_use]
    pub fn new(category: IssueCategory, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Critical issue
    #[inline]
    #[must_use]
    pub fn critical(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Critical, message)
    }

    /// Warning issue
    #[inline]
    #[must_use]
    pub fn warning(category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, message)
    }

    /// With location hint
    #[inline]
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Deduplication key
    #[inline]
    #[must_use]
    pub fn key(&self) -> (IssueCategory, Option<&str>) {
        (self.category, self.location.as_deref())
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.severity, self.category, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({location})")?;
        }
        Ok(())
    }
}

/// Check whether any issue in `issues` requires repair
#[inline]
#[must_use]
pub fn needs_repair(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity.requires_repair())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
        assert!(Severity::Warning.requires_repair());
        assert!(!Severity::Info.requires_repair());
    }

    #[test]
    fn info_only_does_not_need_repair() {
        let issues = vec![ValidationIssue::new(
            IssueCategory::Syntax,
            Severity::Info,
            "note",
        )];
        assert!(!needs_repair(&issues));
        assert!(needs_repair(&[ValidationIssue::warning(
            IssueCategory::InterfaceConvention,
            "no router"
        )]));
    }

    #[test]
    fn display_includes_location() {
        let issue = ValidationIssue::critical(IssueCategory::Syntax, "unexpected token").at("line 3:1");
        assert_eq!(
            issue.to_string(),
            "[critical/syntax] unexpected token (line 3:1)"
        );
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&IssueCategory::ReferenceIntegrity).unwrap();
        assert_eq!(json, "\"reference-integrity\"");
    }
}
