//! Per-artifact results
//!
//! [`ArtifactResult`] tracks the latest candidate, status and issues of one
//! spec during a run.

use crate::hash::ContentHash;
use crate::issue::{IssueCategory, Severity, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Not started
    Pending,
    /// Being generated, validated or repaired
    Generating,
    /// Passed validation
    Validated,
    /// Iteration budget spent with issues left; content kept
    Exhausted,
    /// Content generator failed permanently or ran out of retries
    Failed,
    /// A dependency failed
    Blocked,
}

impl ArtifactStatus {
    /// Check if the status is final for the run
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::Validated
                | ArtifactStatus::Exhausted
                | ArtifactStatus::Failed
                | ArtifactStatus::Blocked
        )
    }

    /// Check if dependents may use this artifact's content
    #[inline]
    #[must_use]
    pub fn has_content(&self) -> bool {
        matches!(self, ArtifactStatus::Validated | ArtifactStatus::Exhausted)
    }

    /// Check if dependents must be blocked
    #[inline]
    #[must_use]
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, ArtifactStatus::Failed | ArtifactStatus::Blocked)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Generating => "generating",
            ArtifactStatus::Validated => "validated",
            ArtifactStatus::Exhausted => "exhausted",
            ArtifactStatus::Failed => "failed",
            ArtifactStatus::Blocked => "blocked",
        };
        f.write_str(name)
    }
}

/// Result of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactResult {
    /// Name of the spec
    pub spec_name: String,
    /// Latest candidate text
    pub content: String,
    /// Current status
    pub status: ArtifactStatus,
    /// Generate+validate cycles consumed
    pub iteration: u32,
    /// Issues of the latest validation
    pub issues: Vec<ValidationIssue>,
    /// Failure reason when `status` is failed or blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ArtifactResult {
    /// Create a pending result
    #[inline]
    #[must_use]
    pub fn pending(spec_name: impl Into<String>) -> Self {
        Self {
            spec_name: spec_name.into(),
            content: String::new(),
            status: ArtifactStatus::Pending,
            iteration: 0,
            issues: Vec::new(),
            failure: None,
        }
    }

    /// Hash of the latest candidate
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.content)
    }

    /// Count issues of a severity
    #[inline]
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Distinct categories among the latest issues
    #[must_use]
    pub fn failing_categories(&self) -> Vec<IssueCategory> {
        let mut categories: Vec<_> = self.issues.iter().map(|i| i.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}
