//! Check trait
//!
//! A check inspects one parsed candidate and reports zero or more issues of
//! its own category. Checks are stateless and independently registrable.

use crate::modules::ModuleIndex;
use crate::source::SourceUnit;
use kiln_artifact::{ArtifactSpec, IssueCategory, ValidationIssue};

/// Everything a check may look at
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a, 'src> {
    /// Spec the candidate was generated for
    pub spec: &'a ArtifactSpec,
    /// Parsed candidate
    pub source: &'a SourceUnit<'src>,
    /// Planned and produced modules of the run
    pub modules: &'a ModuleIndex,
}

/// One structural check of the battery
pub trait Check: Send + Sync + 'static {
    /// Stable name, used in logs
    fn name(&self) -> &'static str;

    /// Category of every issue this check reports
    fn category(&self) -> IssueCategory;

    /// Check if this check runs for `spec`
    fn applies_to(&self, spec: &ArtifactSpec) -> bool {
        let _ = spec;
        true
    }

    /// Inspect the candidate
    fn run(&self, ctx: &CheckContext<'_, '_>) -> Vec<ValidationIssue>;
}
