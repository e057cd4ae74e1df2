//! Content generator replaying sources from a directory
//!
//! Attempt `n` of artifact `crud` reads `crud.<n>.py` when present and
//! falls back to `crud.py`. A missing fixture is a permanent failure, so the
//! artifact fails and its dependents are blocked like any other failure.

use async_trait::async_trait;
use kiln_artifact::ArtifactKind;
use kiln_core::{ContentGenerator, GenerationError, GenerationRequest};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replays `<dir>/<artifact>.py` fixtures
#[derive(Debug, Clone)]
pub struct FixtureGenerator {
    dir: PathBuf,
}

impl FixtureGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate files for an attempt, most specific first
    #[must_use]
    pub fn candidates(&self, artifact: &str, attempt: u32) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{artifact}.{attempt}.py")),
            self.dir.join(format!("{artifact}.py")),
        ]
    }
}

#[async_trait]
impl ContentGenerator for FixtureGenerator {
    async fn generate(
        &self,
        _kind: ArtifactKind,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let artifact = request.spec.name.as_str();
        let attempt = request.repair.as_ref().map_or(1, |r| r.iteration);

        for path in self.candidates(artifact, attempt) {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    debug!(artifact, attempt, path = %path.display(), "fixture loaded");
                    return Ok(content);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(GenerationError::permanent(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Err(GenerationError::permanent(format!(
            "no fixture for '{artifact}' in {}",
            self.dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::Planner;
    use kiln_test_utils::widget;

    fn request(name: &str) -> GenerationRequest {
        let plan = Planner::default().plan(&widget()).unwrap();
        let spec = plan.into_iter().find(|s| s.name == name).unwrap();
        GenerationRequest::new(spec, Vec::new())
    }

    #[tokio::test]
    async fn reads_plain_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.py"), "X = 1\n").unwrap();

        let generator = FixtureGenerator::new(dir.path());
        let content = generator
            .generate(ArtifactKind::Foundation, &request("config"))
            .await
            .unwrap();
        assert_eq!(content, "X = 1\n");
    }

    #[tokio::test]
    async fn first_attempt_prefers_numbered_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.py"), "X = 2\n").unwrap();
        std::fs::write(dir.path().join("config.1.py"), "X = (\n").unwrap();

        let generator = FixtureGenerator::new(dir.path());
        let content = generator
            .generate(ArtifactKind::Foundation, &request("config"))
            .await
            .unwrap();
        assert_eq!(content, "X = (\n");
    }

    #[tokio::test]
    async fn missing_fixture_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FixtureGenerator::new(dir.path());
        let err = generator
            .generate(ArtifactKind::Foundation, &request("config"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("no fixture for 'config'"));
    }
}
