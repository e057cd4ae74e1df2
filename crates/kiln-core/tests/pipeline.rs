//! End-to-end runs against scripted generators

use kiln_artifact::{ArtifactStatus, Features, Persistence, Tier};
use kiln_core::{
    Orchestrator, Planner, RationaleCode, ReferenceLibrary, RunConfig, RunOutcome, RunReport,
    TracePhase,
};
use kiln_test_utils::{
    valid_source, widget, FailingGenerator, Scripted, ScriptedGenerator, BASELINE_ARTIFACTS,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn orchestrator(generator: Arc<ScriptedGenerator>, config: RunConfig) -> Orchestrator {
    Orchestrator::new(generator, config).unwrap()
}

fn phases(report: &RunReport) -> Vec<TracePhase> {
    report.trace.iter().map(|e| e.phase).collect()
}

#[tokio::test]
async fn clean_run_validates_everything() {
    let generator = Arc::new(ScriptedGenerator::valid());
    let report = orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.names(), BASELINE_ARTIFACTS.to_vec());
    assert!(report.all_validated(), "{:#?}", report.artifacts);
    assert_eq!(report.total_iterations, 9);
    assert_eq!(report.corrections_applied, 0);
    assert_eq!(report.critical_count, 0);
    assert_eq!(report.warning_count, 0);
    assert_eq!(generator.artifact_order(), BASELINE_ARTIFACTS.to_vec());

    // plan + (reason, generate, validate) per artifact + final reason
    assert_eq!(report.trace.len(), 1 + 9 * 3 + 1);
}

#[tokio::test]
async fn generator_sees_produced_dependencies_in_queue_order() {
    let generator = Arc::new(ScriptedGenerator::valid());
    orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    let crud = generator.calls_for("crud");
    assert_eq!(crud.len(), 1);
    assert_eq!(crud[0].dependencies, vec!["db-session", "model", "schema"]);
    assert!(generator.calls_for("config")[0].dependencies.is_empty());
}

#[tokio::test]
async fn repair_then_validated() {
    let generator = Arc::new(
        ScriptedGenerator::valid().script("model", [Scripted::Invalid, Scripted::Valid]),
    );
    let report = orchestrator(generator.clone(), RunConfig::default().with_max_iterations(3))
        .run(&widget())
        .await
        .unwrap();

    let model = report.artifact("model").unwrap();
    assert_eq!(model.status, ArtifactStatus::Validated);
    assert_eq!(model.iterations, 2);
    assert!(model.issues.is_empty());
    assert_eq!(report.corrections_applied, 1);
    assert_eq!(report.total_iterations, 10);

    let calls = generator.calls_for("model");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].repair_iteration, None);
    assert_eq!(calls[1].repair_iteration, Some(2));
    assert!(calls[1].repair_issue_count > 0);

    assert_eq!(report.trace.len(), 1 + 9 * 3 + 3 + 1);
}

#[tokio::test]
async fn always_invalid_keeps_last_candidate() {
    let candidates = ["first = (\n", "second = (\n", "third = (\n"];
    let generator = Arc::new(ScriptedGenerator::valid().script(
        "model",
        candidates.iter().map(|c| Scripted::Content((*c).to_string())),
    ));
    let report = orchestrator(generator.clone(), RunConfig::default().with_max_iterations(3))
        .run(&widget())
        .await
        .unwrap();

    let model = report.artifact("model").unwrap();
    assert_eq!(model.status, ArtifactStatus::Exhausted);
    assert_eq!(model.iterations, 3);
    assert!(!model.issues.is_empty());
    assert_eq!(model.content.as_deref(), Some("third = (\n"));
    assert_eq!(generator.calls_for("model").len(), 3);
    assert_eq!(report.corrections_applied, 2);

    // exhausted content is still handed to dependents
    assert_eq!(
        report.artifact("crud").unwrap().status,
        ArtifactStatus::Validated
    );
    assert!(report.critical_count > 0);
}

#[tokio::test]
async fn failed_repair_is_not_a_correction() {
    let generator = Arc::new(ScriptedGenerator::valid().script(
        "model",
        [Scripted::Invalid, Scripted::Permanent("refused".into())],
    ));
    let report = orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    let model = report.artifact("model").unwrap();
    assert_eq!(model.status, ArtifactStatus::Failed);
    assert_eq!(model.iterations, 2);
    assert_eq!(model.corrections(), 0);
    assert_eq!(generator.calls_for("model").len(), 2);
    assert_eq!(report.corrections_applied, 0);
}

#[tokio::test]
async fn warnings_are_tolerated_once_budget_is_spent() {
    let plan = Planner::default().plan(&widget()).unwrap();
    let endpoint = plan.iter().find(|s| s.name == "endpoint").unwrap();
    let without_status = valid_source(endpoint).replace(", status_code=201", "");

    let generator = Arc::new(
        ScriptedGenerator::valid().script("endpoint", [Scripted::Content(without_status)]),
    );
    let report = orchestrator(generator, RunConfig::default().with_max_iterations(1))
        .run(&widget())
        .await
        .unwrap();

    let endpoint = report.artifact("endpoint").unwrap();
    assert_eq!(endpoint.status, ArtifactStatus::Exhausted);
    assert_eq!(endpoint.iterations, 1);
    assert_eq!(report.warning_count, 1);
    assert_eq!(report.critical_count, 0);
    assert_eq!(
        report.artifact("router").unwrap().status,
        ArtifactStatus::Validated
    );
}

#[tokio::test]
async fn foundation_failure_blocks_only_its_subtree() {
    let generator = Arc::new(
        ScriptedGenerator::valid().script("config", [Scripted::Permanent("bad".to_string())]),
    );
    let report = orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    assert_eq!(report.with_status(ArtifactStatus::Failed), vec!["config"]);
    assert_eq!(
        report.with_status(ArtifactStatus::Blocked),
        vec!["db-session", "crud", "endpoint", "router", "main"]
    );
    assert_eq!(
        report.with_status(ArtifactStatus::Validated),
        vec!["base-model", "model", "schema"]
    );

    let config = report.artifact("config").unwrap();
    assert_eq!(config.iterations, 1);
    assert_eq!(
        config.failure.as_deref(),
        Some("permanent generation failure: bad")
    );
    let main = report.artifact("main").unwrap();
    assert_eq!(main.iterations, 0);
    assert!(main.content.is_none());

    assert_eq!(
        generator.artifact_order(),
        vec!["config", "base-model", "model", "schema"]
    );
    // report still lists every planned artifact
    assert_eq!(report.artifacts.len(), 9);
    assert_eq!(report.trace.len(), 1 + 2 + 3 * 3 + 1);
}

#[tokio::test]
async fn permanent_generator_fails_roots_and_blocks_the_rest() {
    let report = Orchestrator::new(Arc::new(FailingGenerator), RunConfig::default())
        .unwrap()
        .run(&widget())
        .await
        .unwrap();

    assert_eq!(
        report.with_status(ArtifactStatus::Failed),
        vec!["config", "base-model", "schema"]
    );
    assert_eq!(report.with_status(ArtifactStatus::Blocked).len(), 6);
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn trace_follows_phase_grammar() {
    let generator = Arc::new(
        ScriptedGenerator::valid().script("schema", [Scripted::Invalid, Scripted::Valid]),
    );
    let report = orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    let phases = phases(&report);
    assert_eq!(phases[0], TracePhase::Plan);
    assert_eq!(*phases.last().unwrap(), TracePhase::Reason);

    // every generate is followed by validate, every repair by generate
    for pair in phases.windows(2) {
        match pair[0] {
            TracePhase::Generate => assert_eq!(pair[1], TracePhase::Validate),
            TracePhase::Repair => assert_eq!(pair[1], TracePhase::Generate),
            TracePhase::Reason => {
                assert!(matches!(pair[1], TracePhase::Generate));
            }
            TracePhase::Plan => assert_eq!(pair[1], TracePhase::Reason),
            TracePhase::Validate => {
                assert!(matches!(pair[1], TracePhase::Reason | TracePhase::Repair));
            }
        }
    }

    let cycles = phases.iter().filter(|p| **p == TracePhase::Generate).count();
    assert_eq!(cycles, generator.call_count());
    let reasons = phases.iter().filter(|p| **p == TracePhase::Reason).count();
    let repairs = phases.iter().filter(|p| **p == TracePhase::Repair).count();
    assert_eq!(reasons, 9 + 1);
    assert_eq!(repairs, 1);
    assert_eq!(phases.len(), 1 + reasons + 2 * cycles + repairs);

    let indices: Vec<u64> = report.trace.iter().map(|e| e.step_index).collect();
    assert!(indices.windows(2).all(|w| w[0] < w[1]));

    let last = report.trace.last().unwrap().decision.as_ref().unwrap();
    assert_eq!(last.rationale, RationaleCode::QueueDrained);
    let first_reason = report.trace[1].decision.as_ref().unwrap();
    assert_eq!(first_reason.spec.as_deref(), Some("config"));
    assert_eq!(first_reason.rationale, RationaleCode::NextInOrder);
}

#[tokio::test]
async fn identical_runs_are_deterministic() {
    let script = || {
        Arc::new(
            ScriptedGenerator::valid()
                .script("crud", [Scripted::Invalid, Scripted::Valid])
                .script("router", [Scripted::Permanent("no".to_string())]),
        )
    };
    let first = orchestrator(script(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();
    let second = orchestrator(script(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.names(), second.names());
    for (a, b) in first.artifacts.iter().zip(&second.artifacts) {
        assert_eq!(a.status, b.status, "{}", a.name);
        assert_eq!(a.iterations, b.iterations, "{}", a.name);
        assert_eq!(a.content_hash, b.content_hash, "{}", a.name);
    }
    let phases_a: Vec<_> = first.trace.iter().map(|e| (e.phase, e.artifact.clone())).collect();
    let phases_b: Vec<_> = second.trace.iter().map(|e| (e.phase, e.artifact.clone())).collect();
    assert_eq!(phases_a, phases_b);
}

#[tokio::test]
async fn widget_tiers_are_ordered() {
    let plan = Planner::default().plan(&widget()).unwrap();
    let tiers: Vec<Tier> = plan.iter().map(|s| s.tier()).collect();
    assert!(tiers.windows(2).all(|w| w[0] <= w[1]));

    let names_in = |tier: Tier| -> Vec<&str> {
        plan.iter()
            .filter(|s| s.tier() == tier)
            .map(|s| s.name.as_str())
            .collect()
    };
    assert_eq!(names_in(Tier::Foundation), vec!["config", "db-session", "base-model"]);
    assert_eq!(names_in(Tier::Domain), vec!["model", "schema", "crud", "endpoint"]);
    assert_eq!(names_in(Tier::Aggregation), vec!["router", "main"]);
}

#[tokio::test]
async fn protected_resource_runs_clean() {
    let description = widget().with_features(Features::protected());
    let generator = Arc::new(ScriptedGenerator::valid());
    let report = orchestrator(generator, RunConfig::default())
        .run(&description)
        .await
        .unwrap();

    assert_eq!(report.artifacts.len(), 15);
    assert!(report.all_validated(), "{:#?}", report.artifacts);
}

#[tokio::test]
async fn mongo_resource_runs_clean() {
    let description = widget().with_persistence(Persistence::MongoDb);
    let generator = Arc::new(ScriptedGenerator::valid());
    let report = orchestrator(generator, RunConfig::default())
        .run(&description)
        .await
        .unwrap();

    assert!(report.all_validated(), "{:#?}", report.artifacts);
    let model = report.artifact("model").unwrap();
    assert!(model.content.as_deref().unwrap().contains("BaseDocument"));
}

#[tokio::test]
async fn self_import_is_repaired() {
    let plan = Planner::default().plan(&widget()).unwrap();
    let crud = plan.iter().find(|s| s.name == "crud").unwrap();
    let generator = Arc::new(ScriptedGenerator::valid().script(
        "crud",
        [
            Scripted::Content(kiln_test_utils::self_importing_source(crud)),
            Scripted::Valid,
        ],
    ));
    let report = orchestrator(generator.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    assert_eq!(report.artifact("crud").unwrap().iterations, 2);
    assert!(report.all_validated());
}

#[tokio::test]
async fn reference_snippets_reach_the_generator() {
    let mut library = ReferenceLibrary::new();
    library.insert("crud", "def get(db, id): ...");

    let generator = Arc::new(ScriptedGenerator::valid());
    orchestrator(generator.clone(), RunConfig::default())
        .with_references(library)
        .run(&widget())
        .await
        .unwrap();
    assert!(generator.calls().iter().all(|c| c.has_reference));

    let bare = Arc::new(ScriptedGenerator::valid());
    orchestrator(bare.clone(), RunConfig::default())
        .run(&widget())
        .await
        .unwrap();
    assert!(bare.calls().iter().all(|c| !c.has_reference));
}

#[tokio::test]
async fn fenced_output_is_unwrapped() {
    let plan = Planner::default().plan(&widget()).unwrap();
    let schema = plan.iter().find(|s| s.name == "schema").unwrap();
    let fenced = format!("```python\n{}```\n", valid_source(schema));

    let generator = Arc::new(ScriptedGenerator::valid().script("schema", [Scripted::Content(fenced)]));
    let report = orchestrator(generator, RunConfig::default())
        .run(&widget())
        .await
        .unwrap();

    let schema_report = report.artifact("schema").unwrap();
    assert_eq!(schema_report.status, ArtifactStatus::Validated);
    assert_eq!(schema_report.iterations, 1);
    assert!(!schema_report.content.as_deref().unwrap().contains("```"));
}
