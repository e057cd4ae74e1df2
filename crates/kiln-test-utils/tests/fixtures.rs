//! Canonical sources pass the default battery

use kiln_artifact::{Features, Persistence, ResourceDescription};
use kiln_core::Planner;
use kiln_test_utils::{valid_source, widget, INVALID_SOURCE};
use kiln_validation::{ModuleIndex, SourceUnit, ValidationInput, ValidatorBattery};

/// Validate every fixture in queue order, recording each as produced
fn assert_plan_passes(description: &ResourceDescription) {
    let plan = Planner::default().plan(description).unwrap();
    let battery = ValidatorBattery::with_defaults();
    let mut modules = ModuleIndex::from_specs("app", &plan);

    for spec in &plan {
        let content = valid_source(spec);
        let issues = battery.validate(&ValidationInput {
            spec,
            content: &content,
            modules: &modules,
        });
        assert!(issues.is_empty(), "{}: {issues:#?}\n{content}", spec.name);

        let unit = SourceUnit::parse(&content).unwrap();
        modules.record_produced(spec.module.clone(), &unit);
    }
}

#[test]
fn baseline_fixtures_pass() {
    assert_plan_passes(&widget());
}

#[test]
fn authentication_fixtures_pass() {
    assert_plan_passes(&widget().with_features(Features::authentication()));
    assert_plan_passes(&widget().with_features(Features::protected()));
}

#[test]
fn mongo_fixtures_pass() {
    assert_plan_passes(&widget().with_persistence(Persistence::MongoDb));
}

#[test]
fn invalid_source_fails_syntax() {
    let unit = SourceUnit::parse(INVALID_SOURCE).unwrap();
    assert!(unit.has_errors());
}
