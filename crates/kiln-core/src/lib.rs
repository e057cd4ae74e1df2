//! Kiln Core - generate, validate, repair
//!
//! The iterative pipeline that:
//! - Plans a dependency-respecting queue of artifacts for a resource
//! - Generates each artifact through an external [`ContentGenerator`]
//! - Validates every candidate with the validator battery
//! - Requests corrective regenerations within a bounded iteration budget
//! - Records every step in a hash-chained trace and emits a [`RunReport`]
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(generator: Arc<dyn ContentGenerator>) -> Result<(), KilnError> {
//! let orchestrator = Orchestrator::new(generator, RunConfig::new().with_max_iterations(3))?;
//!
//! let description = ResourceDescription::new("widget")
//!     .with_attribute("name", "string")
//!     .with_attribute("price", "number");
//! let report = orchestrator.run(&description).await?;
//!
//! println!("{} corrections applied", report.corrections_applied);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod error;
pub mod generator;
pub mod machine;
pub mod orchestrator;
pub mod planner;
pub mod references;
pub mod repair;
pub mod report;
pub mod state;
pub mod trace;

// Re-exports for convenience
pub use config::RunConfig;
pub use error::{
    ConfigError, GenerationError, KilnError, PlanError, StateMachineError, TraceError,
    TransientKind,
};
pub use generator::{
    normalize_content, CallOutcome, CallPolicy, ContentGenerator, DependencyContent,
    GenerationRequest,
};
pub use machine::{allowed_transitions, transition, Effect, Event, RunPhase, Transition};
pub use orchestrator::Orchestrator;
pub use planner::{order_specs, Planner};
pub use references::ReferenceLibrary;
pub use repair::{IssueGroup, RepairAdvisor, RepairRequest};
pub use report::{ArtifactReport, RunOutcome, RunReport};
pub use state::RunState;
pub use trace::{
    verify_chain, Decision, RationaleCode, TraceEntry, TracePhase, TraceRecorder, TraceStep,
};

pub use tokio_util::sync::CancellationToken;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Kiln Core
    pub use crate::{
        ArtifactReport, CancellationToken, ContentGenerator, GenerationError, GenerationRequest,
        KilnError, Orchestrator, Planner, RunConfig, RunOutcome, RunReport, TransientKind,
    };
    pub use kiln_artifact::{
        ArtifactKind, ArtifactSpec, ArtifactStatus, Features, Persistence, ResourceDescription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
