//! Run configuration
//!
//! [`RunConfig`] is an immutable value handed to every run. It can be built
//! in code, loaded from a TOML or YAML file, and overridden from the
//! environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest allowed per-artifact iteration budget
pub const MIN_ITERATIONS: u32 = 1;
/// Largest allowed per-artifact iteration budget
pub const MAX_ITERATIONS: u32 = 10;

/// Environment override for `max_iterations`
pub const ENV_MAX_ITERATIONS: &str = "KILN_MAX_ITERATIONS";
/// Environment override for `external_call_retry_budget`
pub const ENV_RETRY_BUDGET: &str = "KILN_RETRY_BUDGET";
/// Environment override for `call_timeout_secs`
pub const ENV_CALL_TIMEOUT_SECS: &str = "KILN_CALL_TIMEOUT_SECS";

/// Configuration of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Generate+validate cycles allowed per artifact
    pub max_iterations: u32,
    /// Retries after the first attempt for transient generator failures
    pub external_call_retry_budget: u32,
    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,
    /// First retry delay in milliseconds
    pub backoff_initial_ms: u64,
    /// Retry delay cap in milliseconds
    pub backoff_max_ms: u64,
    /// Top-level package of generated modules
    pub package_root: String,
    /// Directory of `*.example` style-guide snippets
    pub reference_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With iteration budget
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_retry_budget(mut self, retries: u32) -> Self {
        self.external_call_retry_budget = retries;
        self
    }

    /// With call timeout, rounded up to whole seconds
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.call_timeout_secs = timeout.as_secs().saturating_add(partial);
        self
    }

    /// With backoff bounds
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self.backoff_max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With package root
    #[inline]
    #[must_use]
    pub fn with_package_root(mut self, root: impl Into<String>) -> Self {
        self.package_root = root.into();
        self
    }

    /// With style-guide snippet directory
    #[inline]
    #[must_use]
    pub fn with_reference_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reference_dir = Some(dir.into());
        self
    }

    /// Per-call timeout
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// First retry delay
    #[inline]
    #[must_use]
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Retry delay cap
    #[inline]
    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Check ranges and consistency
    ///
    /// # Errors
    /// Returns the first setting that is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(ConfigError::OutOfRange {
                field: "max_iterations",
                value: u64::from(self.max_iterations),
                min: u64::from(MIN_ITERATIONS),
                max: u64::from(MAX_ITERATIONS),
            });
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "call_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid {
                field: "backoff_initial_ms",
                message: format!("exceeds backoff_max_ms ({})", self.backoff_max_ms),
            });
        }
        if !kiln_artifact::is_identifier(&self.package_root) {
            return Err(ConfigError::Invalid {
                field: "package_root",
                message: format!("'{}' is not a python identifier", self.package_root),
            });
        }
        Ok(())
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file
    ///
    /// Missing keys take their defaults. The result is validated.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, has another
    /// extension, or holds out-of-range values
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let config: Self = match extension.as_deref() {
            Some("toml") => toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            Some("yaml" | "yml") => serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `KILN_*` environment overrides
    ///
    /// # Errors
    /// Returns error if an override is not a number or is out of range
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// # Errors
    /// Returns error if an override is not a number or is out of range
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = parse_override(&lookup, ENV_MAX_ITERATIONS)? {
            self.max_iterations = u32::try_from(value).map_err(|_| ConfigError::OutOfRange {
                field: "max_iterations",
                value,
                min: u64::from(MIN_ITERATIONS),
                max: u64::from(MAX_ITERATIONS),
            })?;
        }
        if let Some(value) = parse_override(&lookup, ENV_RETRY_BUDGET)? {
            self.external_call_retry_budget =
                u32::try_from(value).map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_RETRY_BUDGET,
                    value: value.to_string(),
                })?;
        }
        if let Some(value) = parse_override(&lookup, ENV_CALL_TIMEOUT_SECS)? {
            self.call_timeout_secs = value;
        }
        self.validate()?;
        Ok(self)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            external_call_retry_budget: 2,
            call_timeout_secs: 120,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
            package_root: "app".to_string(),
            reference_dir: None,
        }
    }
}

fn parse_override(
    lookup: &impl Fn(&'static str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
}
