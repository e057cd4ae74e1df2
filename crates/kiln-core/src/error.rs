//! Error types for kiln core
//!
//! Provides error handling for:
//! - Planning failures (the only run-fatal errors)
//! - Content generation failures, split into transient and permanent
//! - Configuration loading
//! - Illegal state-machine transitions and trace tampering

use crate::machine::{Event, RunPhase};
use kiln_artifact::{DescriptionError, PathError};
use std::path::PathBuf;

/// Main kiln error type
#[derive(Debug, thiserror::Error)]
pub enum KilnError {
    /// Resource description rejected before generation
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// Run configuration invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Orchestrator attempted an illegal transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// Trace hash chain broken
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    /// Report serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KilnError {
    /// Check if the error was caused by the caller's input
    #[inline]
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Plan(_) | Self::Config(_))
    }
}

/// Planning errors
///
/// Every variant is fatal and raised before any content generator call.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Description failed validation
    #[error("invalid resource description: {0}")]
    InvalidDescription(#[from] DescriptionError),

    /// Two artifacts would be written to the same module
    #[error("artifacts '{first}' and '{second}' both target module {module}")]
    ConflictingModules {
        first: String,
        second: String,
        module: String,
    },

    /// Derived output path is not an importable module
    #[error("invalid output path: {0}")]
    InvalidPath(#[from] PathError),

    /// Dependency names no planned artifact
    #[error("artifact '{spec}' depends on unknown artifact '{dependency}'")]
    UnknownDependency { spec: String, dependency: String },

    /// Dependency sits in a later tier
    #[error("artifact '{spec}' depends on '{dependency}' from a later tier")]
    TierViolation { spec: String, dependency: String },

    /// Dependency graph has a cycle
    #[error("cyclic dependency involving '{0}'")]
    CyclicDependency(String),
}

/// Why a call to the content generator is retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientKind {
    /// No response within the call timeout
    Timeout,
    /// Provider asked us to slow down
    RateLimited,
    /// Provider temporarily unreachable
    Unavailable,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Content generator failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Retryable within the external-call budget
    #[error("transient generation failure ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    /// Not retryable; fails the artifact and blocks its dependents
    #[error("permanent generation failure: {message}")]
    Permanent { message: String },
}

impl GenerationError {
    /// Create transient error
    #[inline]
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Create permanent error
    #[inline]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Extension is neither TOML nor YAML
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Numeric value out of its allowed range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// Environment override is not a number
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    /// Other invalid setting
    #[error("invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// State machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Event not accepted in the current phase
    #[error("illegal transition: {event:?} in phase {from:?}")]
    IllegalTransition { from: RunPhase, event: Event },
}

/// Trace integrity errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Entry hash or link does not match
    #[error("trace integrity violation at step {step_index}")]
    IntegrityViolation { step_index: u64 },

    /// Step indices are not strictly increasing
    #[error("trace step {step_index} is out of order")]
    OutOfOrder { step_index: u64 },
}
