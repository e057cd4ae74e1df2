//! Per-run state
//!
//! [`RunState`] is owned by exactly one run. It holds the planned queue, the
//! result of every spec, the dependency graph used for blocking, and the
//! module index the reference check reads. All mutation goes through
//! [`RunState::apply`], which runs the transition table and applies its
//! effects.

use crate::config::RunConfig;
use crate::error::StateMachineError;
use crate::generator::DependencyContent;
use crate::machine::{transition, Effect, Event, RunPhase, Transition};
use indexmap::IndexMap;
use kiln_artifact::{ArtifactResult, ArtifactSpec, ArtifactStatus, Severity, ValidationIssue};
use kiln_validation::{ModuleIndex, SourceUnit};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use tracing::{debug, warn};

/// State of one run
#[derive(Debug)]
pub struct RunState {
    config: RunConfig,
    specs: IndexMap<String, ArtifactSpec>,
    results: IndexMap<String, ArtifactResult>,
    /// Edges point from a dependency to its dependent; nodes are queue indices
    graph: DiGraphMap<usize, ()>,
    modules: ModuleIndex,
    phase: RunPhase,
    current: Option<String>,
}

impl RunState {
    /// Create state in the planning phase
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let modules = ModuleIndex::new(config.package_root.clone());
        Self {
            config,
            specs: IndexMap::new(),
            results: IndexMap::new(),
            graph: DiGraphMap::new(),
            modules,
            phase: RunPhase::Planning,
            current: None,
        }
    }

    /// Load the planned queue; every spec starts pending
    pub fn load_plan(&mut self, plan: Vec<ArtifactSpec>) {
        self.modules = ModuleIndex::from_specs(self.config.package_root.clone(), &plan);
        for spec in plan {
            self.results
                .insert(spec.name.clone(), ArtifactResult::pending(spec.name.clone()));
            self.specs.insert(spec.name.clone(), spec);
        }

        for (index, spec) in self.specs.values().enumerate() {
            self.graph.add_node(index);
            for dependency in &spec.depends_on {
                if let Some(dep_index) = self.specs.get_index_of(dependency) {
                    self.graph.add_edge(dep_index, index, ());
                }
            }
        }
    }

    /// Feed an event through the transition table and apply its effects
    ///
    /// # Errors
    /// Returns `IllegalTransition` if the current phase rejects `event`;
    /// nothing changes in that case
    pub fn apply(&mut self, event: Event) -> Result<Transition, StateMachineError> {
        let next = transition(self.phase, event)?;
        for effect in &next.effects {
            self.apply_effect(*effect);
        }
        debug!(from = ?self.phase, to = ?next.next, ?event, "transition");
        self.phase = next.next;
        Ok(next)
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Mark(status) => self.mark_current(status),
            Effect::BlockDependents => {
                if let Some(name) = self.current.clone() {
                    self.block_dependents(&name);
                }
            }
            Effect::StartIteration => {
                if let Some(result) = self.current_result_mut() {
                    result.iteration += 1;
                }
            }
            Effect::AssembleReport => self.current = None,
        }
    }

    fn mark_current(&mut self, status: ArtifactStatus) {
        let Some(name) = self.current.as_deref() else {
            return;
        };
        let Some(result) = self.results.get_mut(name) else {
            return;
        };
        result.status = status;
        if !status.has_content() {
            return;
        }
        if let Some(spec) = self.specs.get(name) {
            match SourceUnit::parse(&result.content) {
                Ok(unit) => self.modules.record_produced(spec.module.clone(), &unit),
                Err(error) => warn!(artifact = %name, %error, "could not index produced module"),
            }
        }
    }

    /// Block every pending transitive dependent of `name`
    ///
    /// Returns the names that were blocked, in queue order.
    pub fn block_dependents(&mut self, name: &str) -> Vec<String> {
        let Some(start) = self.specs.get_index_of(name) else {
            return Vec::new();
        };
        let mut reached = Vec::new();
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(node) = bfs.next(&self.graph) {
            if node != start {
                reached.push(node);
            }
        }
        reached.sort_unstable();

        let mut blocked = Vec::new();
        for index in reached {
            let Some((dependent, result)) = self.results.get_index_mut(index) else {
                continue;
            };
            if result.status == ArtifactStatus::Pending {
                result.status = ArtifactStatus::Blocked;
                result.failure = Some(format!("dependency '{name}' failed"));
                blocked.push(dependent.clone());
            }
        }
        if !blocked.is_empty() {
            warn!(artifact = %name, blocked = %blocked.join(","), "dependents blocked");
        }
        blocked
    }

    /// Make `name` the artifact subsequent events refer to
    pub fn select(&mut self, name: &str) {
        self.current = Some(name.to_string());
    }

    /// First pending spec in queue order
    #[must_use]
    pub fn next_pending(&self) -> Option<&ArtifactSpec> {
        self.results
            .values()
            .position(|r| r.status == ArtifactStatus::Pending)
            .and_then(|index| self.specs.get_index(index))
            .map(|(_, spec)| spec)
    }

    /// First dependency of `spec` that failed or is blocked
    #[must_use]
    pub fn failed_dependency<'a>(&self, spec: &'a ArtifactSpec) -> Option<&'a str> {
        spec.depends_on
            .iter()
            .find(|d| {
                self.results
                    .get(d.as_str())
                    .is_some_and(|r| r.status.blocks_dependents())
            })
            .map(String::as_str)
    }

    /// Content of the produced direct dependencies of `spec`, in queue order
    #[must_use]
    pub fn dependency_contents(&self, spec: &ArtifactSpec) -> Vec<DependencyContent> {
        self.specs
            .values()
            .filter(|s| spec.depends_on.contains(&s.name))
            .filter_map(|s| {
                let result = self.results.get(&s.name)?;
                result.status.has_content().then(|| DependencyContent {
                    name: s.name.clone(),
                    module: s.module.clone(),
                    content: result.content.clone(),
                })
            })
            .collect()
    }

    /// Store the latest candidate and its issues on the current artifact
    pub fn set_candidate(&mut self, content: String, issues: Vec<ValidationIssue>) {
        if let Some(result) = self.current_result_mut() {
            result.content = content;
            result.issues = issues;
        }
    }

    /// Store a failure reason on the current artifact
    pub fn set_failure(&mut self, reason: impl Into<String>) {
        if let Some(result) = self.current_result_mut() {
            result.failure = Some(reason.into());
        }
    }

    fn current_result_mut(&mut self) -> Option<&mut ArtifactResult> {
        let name = self.current.as_deref()?;
        self.results.get_mut(name)
    }

    /// Current artifact
    #[must_use]
    pub fn current_spec(&self) -> Option<&ArtifactSpec> {
        self.current.as_deref().and_then(|name| self.specs.get(name))
    }

    /// Result of the current artifact
    #[must_use]
    pub fn current_result(&self) -> Option<&ArtifactResult> {
        self.current.as_deref().and_then(|name| self.results.get(name))
    }

    /// Iteration of the current artifact
    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.current_result().map_or(0, |r| r.iteration)
    }

    /// Check if the current artifact may start another iteration
    #[must_use]
    pub fn budget_left(&self) -> bool {
        self.iteration() < self.config.max_iterations
    }

    /// Phase of the run
    #[inline]
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Check if the run reached `Done` or `Failed`
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Configuration of the run
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Planned and produced modules
    #[inline]
    #[must_use]
    pub fn modules(&self) -> &ModuleIndex {
        &self.modules
    }

    /// Specs in queue order
    pub fn specs(&self) -> impl Iterator<Item = &ArtifactSpec> {
        self.specs.values()
    }

    /// Result of a spec
    #[inline]
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&ArtifactResult> {
        self.results.get(name)
    }

    /// Spec and result pairs in queue order
    pub fn entries(&self) -> impl Iterator<Item = (&ArtifactSpec, &ArtifactResult)> {
        self.specs.values().zip(self.results.values())
    }

    /// Number of planned specs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if nothing was planned
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Issues of a severity across all final issue lists
    #[must_use]
    pub fn issue_count(&self, severity: Severity) -> usize {
        self.results.values().map(|r| r.count(severity)).sum()
    }
}
