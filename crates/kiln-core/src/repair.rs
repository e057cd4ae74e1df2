//! Repair advice
//!
//! Groups the latest issues of a candidate by severity and category and
//! turns them into a corrective request. The full issue list always travels
//! with the request.

use kiln_artifact::{ArtifactSpec, IssueCategory, Persistence, Severity, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Issues sharing one severity and category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueGroup {
    /// Severity of every issue in the group
    pub severity: Severity,
    /// Category of every issue in the group
    pub category: IssueCategory,
    /// Issues in validation order
    pub issues: Vec<ValidationIssue>,
}

/// Corrective context for a repair call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRequest {
    /// Iteration the repair call starts
    pub iteration: u32,
    /// Candidate that failed validation
    pub previous_content: String,
    /// Complete issue list of the latest validation
    pub issues: Vec<ValidationIssue>,
    /// Issues grouped most severe first
    pub groups: Vec<IssueGroup>,
    /// What must change, one line per failing category
    pub instructions: Vec<String>,
}

impl RepairRequest {
    /// Failing categories in group order, without repeats
    #[must_use]
    pub fn categories(&self) -> Vec<IssueCategory> {
        let mut categories = Vec::new();
        for group in &self.groups {
            if !categories.contains(&group.category) {
                categories.push(group.category);
            }
        }
        categories
    }

    /// Render as prompt text
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "Attempt {} of this file. The previous version failed validation with {} issue(s).\n",
            self.iteration,
            self.issues.len()
        );
        for group in &self.groups {
            let _ = writeln!(out, "\n[{} / {}]", group.severity, group.category);
            for issue in &group.issues {
                match &issue.location {
                    Some(location) => {
                        let _ = writeln!(out, "- {} (at {location})", issue.message);
                    }
                    None => {
                        let _ = writeln!(out, "- {}", issue.message);
                    }
                }
            }
        }
        out.push_str("\nRequired changes:\n");
        for instruction in &self.instructions {
            let _ = writeln!(out, "- {instruction}");
        }
        out.push_str("\nReturn the complete corrected file.\n");
        out
    }
}

/// Builds repair requests
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairAdvisor;

impl RepairAdvisor {
    /// Create advisor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build the corrective request for the next iteration
    #[must_use]
    pub fn advise(
        &self,
        spec: &ArtifactSpec,
        previous_content: &str,
        issues: &[ValidationIssue],
        next_iteration: u32,
    ) -> RepairRequest {
        let mut grouped: BTreeMap<(Severity, IssueCategory), Vec<ValidationIssue>> =
            BTreeMap::new();
        for issue in issues {
            grouped
                .entry((issue.severity, issue.category))
                .or_default()
                .push(issue.clone());
        }
        let groups: Vec<IssueGroup> = grouped
            .into_iter()
            .map(|((severity, category), issues)| IssueGroup {
                severity,
                category,
                issues,
            })
            .collect();

        let mut request = RepairRequest {
            iteration: next_iteration,
            previous_content: previous_content.to_string(),
            issues: issues.to_vec(),
            groups,
            instructions: Vec::new(),
        };
        request.instructions = request
            .categories()
            .into_iter()
            .map(|category| instruction(category, spec))
            .collect();
        request
    }
}

fn instruction(category: IssueCategory, spec: &ArtifactSpec) -> String {
    match category {
        IssueCategory::Syntax => {
            "Fix every syntax error so the module parses as valid Python.".to_string()
        }
        IssueCategory::ReferenceIntegrity => {
            if spec.depends_on.is_empty() {
                "Remove imports of project modules; this file has no project dependencies."
                    .to_string()
            } else {
                let deps: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
                format!(
                    "Import project code only from the declared dependencies ({}) and remove \
                     circular or self imports.",
                    deps.join(", ")
                )
            }
        }
        IssueCategory::InterfaceConvention => "Create an APIRouter, register every handler with \
             @router.<verb>, declare response_model (or a return type) on each route, return \
             status_code=201 from POST routes and inject collaborators with Depends from fastapi."
            .to_string(),
        IssueCategory::DataModelConvention => match spec.context.persistence {
            Persistence::Sql => "Declare the model class with SQLAlchemy 2.0 typing: Mapped[...] \
                 annotations assigned from mapped_column(), no Column()."
                .to_string(),
            Persistence::MongoDb => {
                "Declare the model as a Beanie Document subclass with annotated fields.".to_string()
            }
        },
    }
}
