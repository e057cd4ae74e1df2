//! Run report
//!
//! The serializable outcome of a run. Every planned artifact appears exactly
//! once, whatever its final status, including specs still pending after a
//! cancellation.

use crate::error::KilnError;
use crate::state::RunState;
use crate::trace::TraceEntry;
use kiln_artifact::{ArtifactKind, ArtifactStatus, ContentHash, Severity, ValidationIssue};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Queue drained
    Completed,
    /// Caller cancelled before the queue drained
    Cancelled,
}

/// Report entry of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReport {
    /// Spec name
    pub name: String,
    /// Category
    pub kind: ArtifactKind,
    /// Output file path
    pub path: String,
    /// Final status
    pub status: ArtifactStatus,
    /// Generate+validate cycles consumed
    pub iterations: u32,
    /// Issues of the latest validation
    pub issues: Vec<ValidationIssue>,
    /// Hash of the final content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<ContentHash>,
    /// Final content, present for validated and exhausted artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Why the artifact failed or was blocked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ArtifactReport {
    /// Repaired candidates that reached validation
    ///
    /// The first iteration is never a repair. A failed artifact stopped in a
    /// generate call, so its last iteration produced no candidate.
    #[must_use]
    pub fn corrections(&self) -> u32 {
        let unvalidated = match self.status {
            ArtifactStatus::Failed => 2,
            _ => 1,
        };
        self.iterations.saturating_sub(unvalidated)
    }
}

/// Final report of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Run identifier
    pub run_id: Ulid,
    /// Resource the run produced
    pub resource: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Every planned artifact in queue order
    pub artifacts: Vec<ArtifactReport>,
    /// Sum of per-artifact iterations
    pub total_iterations: u32,
    /// Critical issues left in final issue lists
    pub critical_count: usize,
    /// Warnings left in final issue lists
    pub warning_count: usize,
    /// Repaired candidates that reached validation across the run
    ///
    /// A repair call that failed before producing a candidate is not counted.
    pub corrections_applied: u32,
    /// Complete trace
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    /// Assemble from the final run state
    #[must_use]
    pub fn assemble(
        run_id: Ulid,
        resource: impl Into<String>,
        outcome: RunOutcome,
        state: &RunState,
        trace: Vec<TraceEntry>,
    ) -> Self {
        let artifacts: Vec<ArtifactReport> = state
            .entries()
            .map(|(spec, result)| {
                let produced = result.status.has_content();
                ArtifactReport {
                    name: spec.name.clone(),
                    kind: spec.kind,
                    path: spec.path.clone(),
                    status: result.status,
                    iterations: result.iteration,
                    issues: result.issues.clone(),
                    content_hash: produced.then(|| result.content_hash()),
                    content: produced.then(|| result.content.clone()),
                    failure: result.failure.clone(),
                }
            })
            .collect();

        Self {
            run_id,
            resource: resource.into(),
            outcome,
            total_iterations: artifacts.iter().map(|a| a.iterations).sum(),
            critical_count: state.issue_count(Severity::Critical),
            warning_count: state.issue_count(Severity::Warning),
            corrections_applied: artifacts.iter().map(ArtifactReport::corrections).sum(),
            artifacts,
            trace,
        }
    }

    /// Report entry by name
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&ArtifactReport> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Artifact names in queue order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.name.as_str()).collect()
    }

    /// Names of artifacts with a given status
    #[must_use]
    pub fn with_status(&self, status: ArtifactStatus) -> Vec<&str> {
        self.artifacts
            .iter()
            .filter(|a| a.status == status)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Check if every artifact validated
    #[must_use]
    pub fn all_validated(&self) -> bool {
        self.artifacts
            .iter()
            .all(|a| a.status == ArtifactStatus::Validated)
    }

    /// Serialize as pretty-printed JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, KilnError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::machine::Event;
    use crate::planner::Planner;
    use kiln_artifact::{IssueCategory, ResourceDescription};

    fn state() -> RunState {
        let plan = Planner::default()
            .plan(&ResourceDescription::new("widget").with_attribute("name", "string"))
            .unwrap();
        let mut state = RunState::new(RunConfig::default());
        state.load_plan(plan);
        state.apply(Event::Planned).unwrap();

        state.select("config");
        state.apply(Event::Selected).unwrap();
        state.apply(Event::Generated).unwrap();
        state.apply(Event::IssuesFound { budget_left: true }).unwrap();
        state.apply(Event::RepairPrepared).unwrap();
        state.set_candidate(
            "X = 1\n".to_string(),
            vec![ValidationIssue::warning(IssueCategory::Syntax, "style").at("1:1")],
        );
        state.apply(Event::Generated).unwrap();
        state.apply(Event::Passed).unwrap();
        state
    }

    #[test]
    fn counts_and_content() {
        let report = RunReport::assemble(
            Ulid::new(),
            "widget",
            RunOutcome::Cancelled,
            &state(),
            Vec::new(),
        );
        assert_eq!(report.artifacts.len(), 9);
        assert_eq!(report.total_iterations, 2);
        assert_eq!(report.corrections_applied, 1);
        assert_eq!(report.warning_count, 1);
        assert_eq!(report.critical_count, 0);

        let config = report.artifact("config").unwrap();
        assert_eq!(config.content.as_deref(), Some("X = 1\n"));
        assert_eq!(config.content_hash, Some(ContentHash::of("X = 1\n")));
        assert_eq!(report.with_status(ArtifactStatus::Pending).len(), 8);
        assert!(!report.all_validated());
    }

    #[test]
    fn json_uses_camel_case() {
        let report = RunReport::assemble(
            Ulid::new(),
            "widget",
            RunOutcome::Completed,
            &state(),
            Vec::new(),
        );
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"totalIterations\": 2"));
        assert!(json.contains("\"correctionsApplied\": 1"));
        assert!(json.contains("\"outcome\": \"completed\""));
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
