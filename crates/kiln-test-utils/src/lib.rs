//! Testing utilities for kiln workspace
//!
//! Deterministic content generators and canonical Python fixtures.

#![allow(missing_docs)]

pub mod fixtures;

use async_trait::async_trait;
use kiln_artifact::{ArtifactKind, ResourceDescription};
use kiln_core::{ContentGenerator, GenerationError, GenerationRequest, TransientKind};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

pub use fixtures::{self_importing_source, valid_source, INVALID_SOURCE};

/// One scripted reaction to a generate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Canonical valid source for the artifact
    Valid,
    /// Source that fails the syntax check
    Invalid,
    /// Fixed text
    Content(String),
    /// Transient failure
    Transient(TransientKind),
    /// Permanent failure
    Permanent(String),
    /// Never answers within any reasonable timeout
    Hang,
}

/// What a generator was asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub artifact: String,
    pub kind: ArtifactKind,
    pub dependencies: Vec<String>,
    pub repair_iteration: Option<u32>,
    pub repair_issue_count: usize,
    pub has_reference: bool,
}

/// Generator answering from per-artifact scripts
///
/// Each call pops the next scripted reaction for the artifact; once a
/// script runs out the default reaction is used.
#[derive(Debug)]
pub struct ScriptedGenerator {
    fallback: Scripted,
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<CallRecord>>,
}

impl ScriptedGenerator {
    pub fn new(fallback: Scripted) -> Self {
        Self {
            fallback,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with valid sources unless scripted otherwise
    pub fn valid() -> Self {
        Self::new(Scripted::Valid)
    }

    /// Always answers with invalid sources unless scripted otherwise
    pub fn invalid() -> Self {
        Self::new(Scripted::Invalid)
    }

    #[must_use]
    pub fn script(self, artifact: &str, reactions: impl IntoIterator<Item = Scripted>) -> Self {
        self.scripts
            .lock()
            .entry(artifact.to_string())
            .or_default()
            .extend(reactions);
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, artifact: &str) -> Vec<CallRecord> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.artifact == artifact)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Artifact names in call order, without repeats
    pub fn artifact_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for call in self.calls.lock().iter() {
            if !order.contains(&call.artifact) {
                order.push(call.artifact.clone());
            }
        }
        order
    }

    fn next_reaction(&self, artifact: &str) -> Scripted {
        self.scripts
            .lock()
            .get_mut(artifact)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        kind: ArtifactKind,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        self.calls.lock().push(CallRecord {
            artifact: request.spec.name.clone(),
            kind,
            dependencies: request.dependencies.iter().map(|d| d.name.clone()).collect(),
            repair_iteration: request.repair.as_ref().map(|r| r.iteration),
            repair_issue_count: request.repair.as_ref().map_or(0, |r| r.issues.len()),
            has_reference: request.reference.is_some(),
        });

        match self.next_reaction(&request.spec.name) {
            Scripted::Valid => Ok(valid_source(&request.spec)),
            Scripted::Invalid => Ok(INVALID_SOURCE.to_string()),
            Scripted::Content(text) => Ok(text),
            Scripted::Transient(kind) => Err(GenerationError::transient(kind, "scripted")),
            Scripted::Permanent(message) => Err(GenerationError::permanent(message)),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(valid_source(&request.spec))
            }
        }
    }
}

/// Generator failing every call permanently
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl ContentGenerator for FailingGenerator {
    async fn generate(
        &self,
        _kind: ArtifactKind,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::permanent(format!(
            "malformed request for '{}'",
            request.spec.name
        )))
    }
}

/// `widget` with `name: string` and `price: number`
pub fn widget() -> ResourceDescription {
    ResourceDescription::new("widget")
        .with_project("shop")
        .with_attribute("name", "string")
        .with_attribute("price", "number")
}

/// Baseline artifact names of a plan without optional features
pub const BASELINE_ARTIFACTS: [&str; 9] = [
    "config",
    "db-session",
    "base-model",
    "model",
    "schema",
    "crud",
    "endpoint",
    "router",
    "main",
];
