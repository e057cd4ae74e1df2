//! Orchestrator state machine
//!
//! A pure transition table: `(phase, event) -> (next phase, effects)`. The
//! orchestrator performs the work of each phase, reports what happened as an
//! [`Event`], and applies the returned [`Effect`]s to the run state.

use crate::error::StateMachineError;
use kiln_artifact::ArtifactStatus;
use serde::{Deserialize, Serialize};

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Building the artifact queue
    Planning,
    /// Choosing the next artifact
    Reasoning,
    /// Awaiting the content generator
    Generating,
    /// Running the validator battery
    Validating,
    /// Building a corrective request
    Repairing,
    /// Report assembled
    Done,
    /// Planning rejected the description
    Failed,
}

impl RunPhase {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Outcome of the work done in a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Planner produced a queue
    Planned,
    /// Planner rejected the description
    PlanRejected,
    /// Next artifact chosen
    Selected,
    /// Next artifact has a failed or blocked dependency
    DependencyFailed,
    /// Nothing left to produce
    QueueEmpty,
    /// Cancellation observed before selecting
    Cancelled,
    /// Generator returned content
    Generated,
    /// Generator failed permanently or ran out of retries
    GenerationFailed,
    /// No issue requires repair
    Passed,
    /// Some issue requires repair
    IssuesFound {
        /// `iteration < max_iterations`
        budget_left: bool,
    },
    /// Corrective request prepared
    RepairPrepared,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Set the current artifact's status
    Mark(ArtifactStatus),
    /// Block every not-yet-started dependent of the current artifact
    BlockDependents,
    /// Count one more generate+validate cycle for the current artifact
    StartIteration,
    /// Build the final report
    AssembleReport,
}

/// Result of a legal transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Phase after the event
    pub next: RunPhase,
    /// Effects to apply, in order
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: RunPhase) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with(next: RunPhase, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }
}

/// Compute the transition for `event` in `phase`
///
/// # Errors
/// Returns `IllegalTransition` if `phase` does not accept `event`
pub fn transition(phase: RunPhase, event: Event) -> Result<Transition, StateMachineError> {
    use Effect::{AssembleReport, BlockDependents, Mark, StartIteration};
    use RunPhase::{Done, Failed, Generating, Planning, Reasoning, Repairing, Validating};

    let transition = match (phase, event) {
        (Planning, Event::Planned) => Transition::to(Reasoning),
        (Planning, Event::PlanRejected) => Transition::to(Failed),

        (Reasoning, Event::Selected) => Transition::with(
            Generating,
            &[Mark(ArtifactStatus::Generating), StartIteration],
        ),
        (Reasoning, Event::DependencyFailed) => {
            Transition::with(Reasoning, &[Mark(ArtifactStatus::Blocked), BlockDependents])
        }
        (Reasoning, Event::QueueEmpty | Event::Cancelled) => {
            Transition::with(Done, &[AssembleReport])
        }

        (Generating, Event::Generated) => Transition::to(Validating),
        (Generating, Event::GenerationFailed) => {
            Transition::with(Reasoning, &[Mark(ArtifactStatus::Failed), BlockDependents])
        }

        (Validating, Event::Passed) => {
            Transition::with(Reasoning, &[Mark(ArtifactStatus::Validated)])
        }
        (Validating, Event::IssuesFound { budget_left: true }) => Transition::to(Repairing),
        (Validating, Event::IssuesFound { budget_left: false }) => {
            Transition::with(Reasoning, &[Mark(ArtifactStatus::Exhausted)])
        }

        (Repairing, Event::RepairPrepared) => Transition::with(Generating, &[StartIteration]),

        (from, event) => return Err(StateMachineError::IllegalTransition { from, event }),
    };
    Ok(transition)
}

/// Phases reachable from `phase` by some event
#[must_use]
pub fn allowed_transitions(phase: RunPhase) -> Vec<RunPhase> {
    use RunPhase::{Done, Failed, Generating, Planning, Reasoning, Repairing, Validating};
    match phase {
        Planning => vec![Reasoning, Failed],
        Reasoning => vec![Generating, Reasoning, Done],
        Generating => vec![Validating, Reasoning],
        Validating => vec![Reasoning, Repairing],
        Repairing => vec![Generating],
        Done | Failed => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [RunPhase; 7] = [
        RunPhase::Planning,
        RunPhase::Reasoning,
        RunPhase::Generating,
        RunPhase::Validating,
        RunPhase::Repairing,
        RunPhase::Done,
        RunPhase::Failed,
    ];

    const ALL_EVENTS: [Event; 12] = [
        Event::Planned,
        Event::PlanRejected,
        Event::Selected,
        Event::DependencyFailed,
        Event::QueueEmpty,
        Event::Cancelled,
        Event::Generated,
        Event::GenerationFailed,
        Event::Passed,
        Event::IssuesFound { budget_left: true },
        Event::IssuesFound { budget_left: false },
        Event::RepairPrepared,
    ];

    #[test]
    fn every_legal_transition_is_allowed() {
        for phase in ALL_PHASES {
            for event in ALL_EVENTS {
                if let Ok(t) = transition(phase, event) {
                    assert!(
                        allowed_transitions(phase).contains(&t.next),
                        "{phase:?} --{event:?}--> {:?} not in allowed set",
                        t.next
                    );
                }
            }
        }
    }

    #[test]
    fn failed_only_reachable_from_planning() {
        for phase in ALL_PHASES {
            for event in ALL_EVENTS {
                if let Ok(t) = transition(phase, event) {
                    if t.next == RunPhase::Failed {
                        assert_eq!(phase, RunPhase::Planning);
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_phases_accept_nothing() {
        for event in ALL_EVENTS {
            assert!(transition(RunPhase::Done, event).is_err());
            assert!(transition(RunPhase::Failed, event).is_err());
        }
    }

    #[test]
    fn exhausted_keeps_going() {
        let t = transition(RunPhase::Validating, Event::IssuesFound { budget_left: false })
            .unwrap();
        assert_eq!(t.next, RunPhase::Reasoning);
        assert_eq!(t.effects, vec![Effect::Mark(ArtifactStatus::Exhausted)]);
    }

    #[test]
    fn repair_starts_new_iteration() {
        let t = transition(RunPhase::Repairing, Event::RepairPrepared).unwrap();
        assert_eq!(t.next, RunPhase::Generating);
        assert_eq!(t.effects, vec![Effect::StartIteration]);
    }

    #[test]
    fn generation_failure_blocks_dependents() {
        let t = transition(RunPhase::Generating, Event::GenerationFailed).unwrap();
        assert_eq!(
            t.effects,
            vec![Effect::Mark(ArtifactStatus::Failed), Effect::BlockDependents]
        );
    }

    #[test]
    fn illegal_transition_reports_context() {
        let err = transition(RunPhase::Generating, Event::Passed).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::IllegalTransition {
                from: RunPhase::Generating,
                event: Event::Passed,
            }
        );
    }
}
