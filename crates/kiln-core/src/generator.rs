//! Content generator interface
//!
//! The generator is an external capability; this module defines what it is
//! given ([`GenerationRequest`]), how its failures are classified, and how
//! calls are bounded by a timeout and retried with exponential backoff
//! ([`CallPolicy`]).

use crate::config::RunConfig;
use crate::error::{GenerationError, TransientKind};
use crate::repair::RepairRequest;
use async_trait::async_trait;
use kiln_artifact::{ArtifactKind, ArtifactSpec, GenerationContext, ModulePath};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Produces source text for an artifact
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate content for one artifact
    ///
    /// # Errors
    /// `Transient` failures are retried within the run's budget; `Permanent`
    /// failures fail the artifact immediately
    async fn generate(
        &self,
        kind: ArtifactKind,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError>;
}

/// Current content of an already produced dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyContent {
    /// Spec name
    pub name: String,
    /// Importable module
    pub module: ModulePath,
    /// Latest candidate
    pub content: String,
}

/// Everything the generator sees for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Artifact to produce
    pub spec: ArtifactSpec,
    /// Direct dependencies with content, in plan order
    pub dependencies: Vec<DependencyContent>,
    /// Style-guide snippet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Corrective context for repair calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairRequest>,
}

impl GenerationRequest {
    /// Create first-attempt request
    #[inline]
    #[must_use]
    pub fn new(spec: ArtifactSpec, dependencies: Vec<DependencyContent>) -> Self {
        Self {
            spec,
            dependencies,
            reference: None,
            repair: None,
        }
    }

    /// With style-guide snippet
    #[inline]
    #[must_use]
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    /// With corrective context
    #[inline]
    #[must_use]
    pub fn with_repair(mut self, repair: RepairRequest) -> Self {
        self.repair = Some(repair);
        self
    }

    /// Generation parameters of the spec
    #[inline]
    #[must_use]
    pub fn context(&self) -> &GenerationContext {
        &self.spec.context
    }

    /// Check if this is a repair call
    #[inline]
    #[must_use]
    pub fn is_repair(&self) -> bool {
        self.repair.is_some()
    }

    /// Content of a dependency by spec name
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.dependencies
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.content.as_str())
    }
}

/// Timeout and retry policy for generator calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Retries after the first attempt
    pub retry_budget: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Delay before the first retry
    pub backoff_initial: Duration,
    /// Delay cap
    pub backoff_max: Duration,
}

impl CallPolicy {
    /// Policy of a run configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            retry_budget: config.external_call_retry_budget,
            timeout: config.call_timeout(),
            backoff_initial: config.backoff_initial(),
            backoff_max: config.backoff_max(),
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_initial
            .checked_mul(factor)
            .map_or(self.backoff_max, |delay| delay.min(self.backoff_max))
    }

    /// Call the generator, retrying transient failures
    ///
    /// Every attempt is bounded by the timeout; a timeout counts as a
    /// transient failure.
    pub async fn call(
        &self,
        generator: &dyn ContentGenerator,
        kind: ArtifactKind,
        request: &GenerationRequest,
    ) -> CallOutcome {
        let mut transient_failures = Vec::new();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, generator.generate(kind, request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::transient(
                    TransientKind::Timeout,
                    format!("no response within {:?}", self.timeout),
                )),
            };

            match result {
                Err(error) if error.is_retryable() && attempt <= self.retry_budget => {
                    let delay = self.backoff(attempt);
                    warn!(
                        artifact = %request.spec.name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "transient generation failure, will retry"
                    );
                    transient_failures.push(error);
                    tokio::time::sleep(delay).await;
                }
                result => {
                    return CallOutcome {
                        result,
                        attempts: attempt,
                        transient_failures,
                    };
                }
            }
        }
    }
}

/// Result of a call including its retry history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// Final result
    pub result: Result<String, GenerationError>,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Transient failures that were retried
    pub transient_failures: Vec<GenerationError>,
}

/// Strip a surrounding Markdown code fence and trailing whitespace
///
/// Generators often wrap source in ```` ```python ... ``` ````; only a fence
/// enclosing the whole text is removed.
#[must_use]
pub fn normalize_content(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .and_then(|body| body.split_once('\n'))
        .map_or(trimmed, |(language, code)| {
            if language.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
                code
            } else {
                trimmed
            }
        });

    let mut normalized: String = unfenced
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    while normalized.ends_with('\n') {
        normalized.pop();
    }
    if !normalized.is_empty() {
        normalized.push('\n');
    }
    normalized
}
