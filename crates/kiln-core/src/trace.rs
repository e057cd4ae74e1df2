//! Append-only run trace
//!
//! Every orchestration step is appended as a [`TraceEntry`]. Entries are
//! hash-chained with SHA-256 so a stored or transported trace can be checked
//! for edits, removals and reordering.

use crate::error::TraceError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Phase a trace entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracePhase {
    /// Planner invocation
    Plan,
    /// Selection of the next artifact
    Reason,
    /// Content generator call
    Generate,
    /// Validator battery run
    Validate,
    /// Corrective request construction
    Repair,
}

impl TracePhase {
    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Reason => "reason",
            Self::Generate => "generate",
            Self::Validate => "validate",
            Self::Repair => "repair",
        }
    }
}

impl fmt::Display for TracePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason of a selection decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RationaleCode {
    /// Next pending spec with every dependency produced
    NextInOrder,
    /// Skipped because a dependency failed or is blocked
    DependencyFailed,
    /// Nothing left to produce
    QueueDrained,
    /// Run cancelled by the caller
    Cancelled,
}

impl RationaleCode {
    /// Kebab-case name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextInOrder => "next-in-order",
            Self::DependencyFailed => "dependency-failed",
            Self::QueueDrained => "queue-drained",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Structured decision of a reasoning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Chosen or skipped spec, if any
    pub spec: Option<String>,
    /// Why
    pub rationale: RationaleCode,
}

/// One recorded step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Position in the run, starting at 0
    pub step_index: u64,
    /// Phase
    pub phase: TracePhase,
    /// Artifact the step concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Structured decision, set on reasoning steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Short rationale for display
    pub thought: String,
    /// What was done
    pub action: String,
    /// What came of it
    pub observation: String,
    /// When the step was recorded
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous entry, zero for the first
    #[serde(with = "hex::serde")]
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
}

impl TraceEntry {
    /// Recompute the hash of this entry
    #[must_use]
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.step_index.to_le_bytes());
        hasher.update(self.phase.as_str().as_bytes());
        hasher.update([0]);
        if let Some(artifact) = &self.artifact {
            hasher.update(artifact.as_bytes());
        }
        hasher.update([0]);
        if let Some(decision) = &self.decision {
            if let Some(spec) = &decision.spec {
                hasher.update(spec.as_bytes());
            }
            hasher.update([0]);
            hasher.update(decision.rationale.as_str().as_bytes());
        }
        hasher.update([0]);
        hasher.update(self.thought.as_bytes());
        hasher.update([0]);
        hasher.update(self.action.as_bytes());
        hasher.update([0]);
        hasher.update(self.observation.as_bytes());
        hasher.update([0]);
        hasher.update(
            self.timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update(self.prev_hash);
        hasher.finalize().into()
    }
}

/// Builder for the content of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    phase: TracePhase,
    artifact: Option<String>,
    decision: Option<Decision>,
    thought: String,
    action: String,
    observation: String,
}

impl TraceStep {
    /// Create step of a phase
    #[inline]
    #[must_use]
    pub fn new(phase: TracePhase) -> Self {
        Self {
            phase,
            artifact: None,
            decision: None,
            thought: String::new(),
            action: String::new(),
            observation: String::new(),
        }
    }

    /// Concerning an artifact
    #[inline]
    #[must_use]
    pub fn artifact(mut self, name: impl Into<String>) -> Self {
        self.artifact = Some(name.into());
        self
    }

    /// With structured decision
    #[inline]
    #[must_use]
    pub fn decision(mut self, spec: Option<&str>, rationale: RationaleCode) -> Self {
        self.decision = Some(Decision {
            spec: spec.map(str::to_string),
            rationale,
        });
        self
    }

    /// With rationale text
    #[inline]
    #[must_use]
    pub fn thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = thought.into();
        self
    }

    /// With action text
    #[inline]
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// With observation text
    #[inline]
    #[must_use]
    pub fn observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = observation.into();
        self
    }
}

/// Append-only trace of one run
///
/// Owned by a single run; no locking.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    /// Create empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, returning its index
    pub fn record(&mut self, step: TraceStep) -> u64 {
        let step_index = self.entries.len() as u64;
        let prev_hash = self.entries.last().map_or([0u8; 32], |e| e.hash);
        let mut entry = TraceEntry {
            step_index,
            phase: step.phase,
            artifact: step.artifact,
            decision: step.decision,
            thought: step.thought,
            action: step.action,
            observation: step.observation,
            timestamp: Utc::now(),
            prev_hash,
            hash: [0u8; 32],
        };
        entry.hash = entry.compute_hash();
        self.entries.push(entry);
        step_index
    }

    /// Read-only view
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Phases in recording order
    #[must_use]
    pub fn phases(&self) -> Vec<TracePhase> {
        self.entries.iter().map(|e| e.phase).collect()
    }

    /// Consume into the entry list
    #[inline]
    #[must_use]
    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }

    /// Verify the hash chain
    ///
    /// # Errors
    /// Returns the first entry whose link, hash or index is wrong
    pub fn verify_integrity(&self) -> Result<(), TraceError> {
        verify_chain(&self.entries)
    }
}

/// Verify a hash-chained entry list, e.g. one read back from a report
///
/// # Errors
/// Returns the first entry whose link, hash or index is wrong
pub fn verify_chain(entries: &[TraceEntry]) -> Result<(), TraceError> {
    let mut prev = [0u8; 32];
    for (position, entry) in entries.iter().enumerate() {
        if entry.step_index != position as u64 {
            return Err(TraceError::OutOfOrder {
                step_index: entry.step_index,
            });
        }
        if entry.prev_hash != prev || entry.hash != entry.compute_hash() {
            return Err(TraceError::IntegrityViolation {
                step_index: entry.step_index,
            });
        }
        prev = entry.hash;
    }
    Ok(())
}
