//! Hash chain of recorded runs

use kiln_core::{verify_chain, Orchestrator, RunConfig, RunReport, TraceError};
use kiln_test_utils::{widget, Scripted, ScriptedGenerator};
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn recorded_run() -> RunReport {
    let generator = Arc::new(
        ScriptedGenerator::valid()
            .script("crud", [Scripted::Invalid, Scripted::Valid])
            .script("router", [Scripted::Permanent("offline".to_string())]),
    );
    Orchestrator::new(generator, RunConfig::default())
        .unwrap()
        .run(&widget())
        .await
        .unwrap()
}

#[tokio::test]
async fn recorded_trace_verifies() {
    let report = recorded_run().await;
    assert!(!report.trace.is_empty());
    assert_eq!(verify_chain(&report.trace), Ok(()));
    assert_eq!(report.trace[0].prev_hash, [0u8; 32]);
    for pair in report.trace.windows(2) {
        assert_eq!(pair[1].prev_hash, pair[0].hash);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn edited_entry_is_detected() {
    let mut trace = recorded_run().await.trace;
    trace[4].observation.push_str(" (edited)");
    assert_eq!(
        verify_chain(&trace),
        Err(TraceError::IntegrityViolation { step_index: 4 })
    );
}

#[tokio::test]
async fn rehashed_entry_breaks_the_next_link() {
    let mut trace = recorded_run().await.trace;
    trace[4].thought = "something else".to_string();
    trace[4].hash = trace[4].compute_hash();
    assert_eq!(
        verify_chain(&trace),
        Err(TraceError::IntegrityViolation { step_index: 5 })
    );
}

#[tokio::test]
async fn dropped_entry_is_detected() {
    let mut trace = recorded_run().await.trace;
    trace.remove(3);
    assert_eq!(
        verify_chain(&trace),
        Err(TraceError::OutOfOrder { step_index: 4 })
    );
}

#[tokio::test]
async fn json_report_keeps_a_valid_chain() {
    let report = recorded_run().await;
    let json = report.to_json_pretty().unwrap();
    assert!(json.contains("\"prevHash\""));
    assert!(json.contains("\"correctionsApplied\": 1"));

    let parsed: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(verify_chain(&parsed.trace), Ok(()));
    assert_eq!(parsed, report);
}
