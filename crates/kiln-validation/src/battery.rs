//! Validator battery
//!
//! Runs every registered check that applies to a candidate and returns the
//! union of their issues, deduplicated by (category, location).

use crate::check::{Check, CheckContext};
use crate::checks::{DataModelCheck, InterfaceCheck, ReferenceCheck, SyntaxCheck};
use crate::modules::ModuleIndex;
use crate::source::SourceUnit;
use indexmap::IndexMap;
use kiln_artifact::{ArtifactSpec, IssueCategory, ValidationIssue};
use tracing::debug;

/// One candidate to validate
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    /// Spec the candidate was generated for
    pub spec: &'a ArtifactSpec,
    /// Candidate text
    pub content: &'a str,
    /// Planned and produced modules of the run
    pub modules: &'a ModuleIndex,
}

/// Registry of checks
pub struct ValidatorBattery {
    checks: Vec<Box<dyn Check>>,
}

impl Default for ValidatorBattery {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ValidatorBattery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorBattery")
            .field("checks", &self.check_names())
            .finish()
    }
}

impl ValidatorBattery {
    /// Create empty battery
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Battery with the four built-in checks
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut battery = Self::new();
        battery.register(SyntaxCheck);
        battery.register(ReferenceCheck);
        battery.register(InterfaceCheck);
        battery.register(DataModelCheck);
        battery
    }

    /// Register a check; checks run in registration order
    pub fn register<C: Check>(&mut self, check: C) {
        self.checks.push(Box::new(check));
    }

    /// Names of registered checks
    #[must_use]
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Number of registered checks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Check if no checks are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Validate one candidate
    ///
    /// Empty content and parser failures are reported as critical syntax
    /// issues; nothing else runs in that case.
    #[must_use]
    pub fn validate(&self, input: &ValidationInput<'_>) -> Vec<ValidationIssue> {
        if input.content.trim().is_empty() {
            return vec![
                ValidationIssue::critical(IssueCategory::Syntax, "content is empty").at("1:1"),
            ];
        }

        let source = match SourceUnit::parse(input.content) {
            Ok(source) => source,
            Err(e) => {
                return vec![ValidationIssue::critical(IssueCategory::Syntax, e.to_string())];
            }
        };

        let ctx = CheckContext {
            spec: input.spec,
            source: &source,
            modules: input.modules,
        };

        let mut unique: IndexMap<(IssueCategory, Option<String>), ValidationIssue> =
            IndexMap::new();
        for check in self.checks.iter().filter(|c| c.applies_to(input.spec)) {
            let found = check.run(&ctx);
            debug!(
                artifact = %input.spec.name,
                check = check.name(),
                issues = found.len(),
                "check finished"
            );
            for issue in found {
                unique
                    .entry((issue.category, issue.location.clone()))
                    .or_insert(issue);
            }
        }
        unique.into_values().collect()
    }
}
