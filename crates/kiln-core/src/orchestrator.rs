//! Run orchestration
//!
//! [`Orchestrator`] drives one run through the transition table:
//! plan once, then for every spec in queue order generate, validate and
//! repair until it validates, exhausts its iteration budget or fails.
//! A failure blocks the failed spec's dependents and nothing else; only a
//! planning error aborts the run.
//!
//! Each run owns its [`RunState`] and [`TraceRecorder`], so one
//! orchestrator can serve any number of concurrent runs.

use crate::config::RunConfig;
use crate::error::KilnError;
use crate::generator::{normalize_content, CallPolicy, ContentGenerator, GenerationRequest};
use crate::machine::Event;
use crate::planner::Planner;
use crate::references::ReferenceLibrary;
use crate::repair::{RepairAdvisor, RepairRequest};
use crate::report::{RunOutcome, RunReport};
use crate::state::RunState;
use crate::trace::{RationaleCode, TracePhase, TraceRecorder, TraceStep};
use kiln_artifact::{needs_repair, ArtifactSpec, ArtifactStatus, ResourceDescription, Severity};
use kiln_validation::{ValidationInput, ValidatorBattery};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use ulid::Ulid;

/// Drives runs
pub struct Orchestrator {
    generator: Arc<dyn ContentGenerator>,
    battery: Arc<ValidatorBattery>,
    advisor: RepairAdvisor,
    references: ReferenceLibrary,
    config: RunConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("battery", &self.battery)
            .field("references", &self.references.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator with the default validator battery
    ///
    /// Loads reference snippets when `config.reference_dir` is set.
    ///
    /// # Errors
    /// Returns error if the configuration is out of range or the reference
    /// directory cannot be read
    pub fn new(generator: Arc<dyn ContentGenerator>, config: RunConfig) -> Result<Self, KilnError> {
        config.validate()?;
        let references = match &config.reference_dir {
            Some(dir) => ReferenceLibrary::load(dir)?,
            None => ReferenceLibrary::new(),
        };
        Ok(Self {
            generator,
            battery: Arc::new(ValidatorBattery::with_defaults()),
            advisor: RepairAdvisor::new(),
            references,
            config,
        })
    }

    /// With a custom validator battery
    #[must_use]
    pub fn with_battery(mut self, battery: ValidatorBattery) -> Self {
        self.battery = Arc::new(battery);
        self
    }

    /// With reference snippets
    #[must_use]
    pub fn with_references(mut self, references: ReferenceLibrary) -> Self {
        self.references = references;
        self
    }

    /// Configuration handed to every run
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the pipeline for a resource
    ///
    /// # Errors
    /// Returns `KilnError::Plan` if the description is rejected; no content
    /// is generated in that case
    pub async fn run(&self, description: &ResourceDescription) -> Result<RunReport, KilnError> {
        self.run_with_cancel(description, CancellationToken::new())
            .await
    }

    /// Run the pipeline, stopping before the next spec once `cancel` fires
    ///
    /// A call in flight is never interrupted. Specs not started when the
    /// token is observed stay pending in the report.
    ///
    /// # Errors
    /// Returns `KilnError::Plan` if the description is rejected
    pub async fn run_with_cancel(
        &self,
        description: &ResourceDescription,
        cancel: CancellationToken,
    ) -> Result<RunReport, KilnError> {
        let run_id = Ulid::new();
        let span = info_span!("run", %run_id, resource = %description.resource.trim());
        self.drive(run_id, description, &cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        run_id: Ulid,
        description: &ResourceDescription,
        cancel: &CancellationToken,
    ) -> Result<RunReport, KilnError> {
        let mut state = RunState::new(self.config.clone());
        let mut trace = TraceRecorder::new();
        let planner = Planner::new(self.config.package_root.clone());

        let plan = match planner.plan(description) {
            Ok(plan) => plan,
            Err(err) => {
                trace.record(
                    TraceStep::new(TracePhase::Plan)
                        .thought("description must be valid before any generation")
                        .action(format!("plan resource '{}'", description.resource))
                        .observation(format!("rejected: {err}")),
                );
                state.apply(Event::PlanRejected)?;
                error!(error = %err, "planning failed");
                return Err(err.into());
            }
        };
        let order: Vec<&str> = plan.iter().map(|s| s.name.as_str()).collect();
        trace.record(
            TraceStep::new(TracePhase::Plan)
                .thought("order artifacts by tier and dependencies")
                .action(format!("plan resource '{}'", description.resource.trim()))
                .observation(format!("{} artifacts: {}", plan.len(), order.join(", "))),
        );
        info!(artifacts = plan.len(), "plan ready");
        state.load_plan(plan);
        state.apply(Event::Planned)?;

        let outcome = loop {
            if cancel.is_cancelled() {
                trace.record(
                    TraceStep::new(TracePhase::Reason)
                        .decision(None, RationaleCode::Cancelled)
                        .thought("cancellation requested")
                        .action("stop")
                        .observation(format!(
                            "{} artifact(s) left pending",
                            state
                                .entries()
                                .filter(|(_, r)| r.status == ArtifactStatus::Pending)
                                .count()
                        )),
                );
                state.apply(Event::Cancelled)?;
                warn!("run cancelled");
                break RunOutcome::Cancelled;
            }

            let Some(spec) = state.next_pending().cloned() else {
                trace.record(
                    TraceStep::new(TracePhase::Reason)
                        .decision(None, RationaleCode::QueueDrained)
                        .thought("every artifact reached a final status")
                        .action("assemble report"),
                );
                state.apply(Event::QueueEmpty)?;
                break RunOutcome::Completed;
            };

            state.select(&spec.name);
            if let Some(dependency) = state.failed_dependency(&spec).map(str::to_string) {
                trace.record(
                    TraceStep::new(TracePhase::Reason)
                        .artifact(&spec.name)
                        .decision(Some(spec.name.as_str()), RationaleCode::DependencyFailed)
                        .thought(format!("dependency '{dependency}' did not produce content"))
                        .action("block")
                        .observation(format!("'{}' blocked", spec.name)),
                );
                state.set_failure(format!("dependency '{dependency}' failed"));
                state.apply(Event::DependencyFailed)?;
                continue;
            }

            let deps: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
            trace.record(
                TraceStep::new(TracePhase::Reason)
                    .artifact(&spec.name)
                    .decision(Some(spec.name.as_str()), RationaleCode::NextInOrder)
                    .thought(if deps.is_empty() {
                        format!("{} '{}' has no dependencies", spec.kind, spec.name)
                    } else {
                        format!("dependencies of '{}' produced: {}", spec.name, deps.join(", "))
                    })
                    .action(format!("produce {}", spec.path)),
            );
            state.apply(Event::Selected)?;
            self.produce(&spec, &mut state, &mut trace).await?;
        };

        let report = RunReport::assemble(
            run_id,
            description.resource.trim(),
            outcome,
            &state,
            trace.into_entries(),
        );
        info!(
            outcome = ?report.outcome,
            validated = report.with_status(ArtifactStatus::Validated).len(),
            exhausted = report.with_status(ArtifactStatus::Exhausted).len(),
            failed = report.with_status(ArtifactStatus::Failed).len(),
            blocked = report.with_status(ArtifactStatus::Blocked).len(),
            corrections = report.corrections_applied,
            "run finished"
        );
        Ok(report)
    }

    /// Generate, validate and repair the selected spec until it settles
    async fn produce(
        &self,
        spec: &ArtifactSpec,
        state: &mut RunState,
        trace: &mut TraceRecorder,
    ) -> Result<(), KilnError> {
        let policy = CallPolicy::from_config(&self.config);
        let reference = self.references.snippet_for(&spec.name);
        let mut repair: Option<RepairRequest> = None;

        loop {
            let iteration = state.iteration();
            let mut request = GenerationRequest::new(spec.clone(), state.dependency_contents(spec))
                .with_reference(reference.clone());
            if let Some(repair) = repair.take() {
                request = request.with_repair(repair);
            }
            debug!(
                artifact = %spec.name,
                iteration,
                repair = request.is_repair(),
                dependencies = request.dependencies.len(),
                "generating"
            );

            let outcome = policy
                .call(self.generator.as_ref(), spec.kind, &request)
                .await;
            let raw = match outcome.result {
                Ok(raw) => {
                    trace.record(
                        TraceStep::new(TracePhase::Generate)
                            .artifact(&spec.name)
                            .thought(format!("iteration {iteration}"))
                            .action(format!("call generator for {} artifact", spec.kind))
                            .observation(format!(
                                "{} bytes after {} attempt(s)",
                                raw.len(),
                                outcome.attempts
                            )),
                    );
                    raw
                }
                Err(err) => {
                    trace.record(
                        TraceStep::new(TracePhase::Generate)
                            .artifact(&spec.name)
                            .thought(format!("iteration {iteration}"))
                            .action(format!("call generator for {} artifact", spec.kind))
                            .observation(format!(
                                "failed after {} attempt(s): {err}",
                                outcome.attempts
                            )),
                    );
                    error!(
                        artifact = %spec.name,
                        iteration,
                        attempts = outcome.attempts,
                        error = %err,
                        "generation failed"
                    );
                    state.set_failure(err.to_string());
                    state.apply(Event::GenerationFailed)?;
                    return Ok(());
                }
            };

            let content = normalize_content(&raw);
            state.apply(Event::Generated)?;

            let issues = self.battery.validate(&ValidationInput {
                spec,
                content: &content,
                modules: state.modules(),
            });
            let critical = issues
                .iter()
                .filter(|i| i.severity == Severity::Critical)
                .count();
            let repair_needed = needs_repair(&issues);
            trace.record(
                TraceStep::new(TracePhase::Validate)
                    .artifact(&spec.name)
                    .thought(format!("iteration {iteration}"))
                    .action(format!("run {} checks", self.battery.len()))
                    .observation(if issues.is_empty() {
                        "no issues".to_string()
                    } else {
                        format!("{} issue(s), {critical} critical", issues.len())
                    }),
            );
            state.set_candidate(content.clone(), issues.clone());

            if !repair_needed {
                state.apply(Event::Passed)?;
                info!(artifact = %spec.name, iteration, "artifact validated");
                return Ok(());
            }

            let budget_left = state.budget_left();
            state.apply(Event::IssuesFound { budget_left })?;
            if !budget_left {
                warn!(
                    artifact = %spec.name,
                    iteration,
                    issues = issues.len(),
                    "iteration budget exhausted, keeping last candidate"
                );
                return Ok(());
            }

            let request = self
                .advisor
                .advise(spec, &content, &issues, iteration + 1);
            let categories: Vec<String> = request
                .categories()
                .iter()
                .map(ToString::to_string)
                .collect();
            trace.record(
                TraceStep::new(TracePhase::Repair)
                    .artifact(&spec.name)
                    .thought(format!("failing checks: {}", categories.join(", ")))
                    .action(format!("request iteration {}", iteration + 1))
                    .observation(format!("{} instruction(s)", request.instructions.len())),
            );
            warn!(
                artifact = %spec.name,
                iteration,
                issues = issues.len(),
                "repairing"
            );
            state.apply(Event::RepairPrepared)?;
            repair = Some(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, PlanError};
    use async_trait::async_trait;
    use kiln_artifact::ArtifactKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for Counting {
        async fn generate(
            &self,
            _kind: ArtifactKind,
            _request: &GenerationRequest,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("X = 1\n".to_string())
        }
    }

    #[tokio::test]
    async fn rejected_description_never_generates() {
        let generator = Arc::new(Counting::default());
        let orchestrator = Orchestrator::new(generator.clone(), RunConfig::default()).unwrap();

        let err = orchestrator
            .run(&ResourceDescription::new("widget"))
            .await
            .unwrap_err();
        assert!(matches!(err, KilnError::Plan(PlanError::InvalidDescription(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = Orchestrator::new(
            Arc::new(Counting::default()),
            RunConfig::default().with_max_iterations(0),
        );
        assert!(matches!(result, Err(KilnError::Config(_))));
    }

    #[tokio::test]
    async fn pre_cancelled_run_leaves_everything_pending() {
        let generator = Arc::new(Counting::default());
        let orchestrator = Orchestrator::new(generator.clone(), RunConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = orchestrator
            .run_with_cancel(
                &ResourceDescription::new("widget").with_attribute("name", "string"),
                cancel,
            )
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.with_status(ArtifactStatus::Pending).len(), 9);
        assert_eq!(report.trace.len(), 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
