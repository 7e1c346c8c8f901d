//! Artifact store: fetch files logged by a training run.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{ModelError, Result};

/// Returns the raw bytes of an artifact logged under a run.
#[tonic::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn download(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>>;
}

/// Artifact store laid out on disk as `<root>/<run_id>/artifacts/<artifact_path>`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an artifact to a path inside the run directory.
    ///
    /// Run ids must be a single path segment and artifact paths must stay
    /// relative, so nothing outside `<root>/<run_id>/artifacts` is reachable.
    pub fn resolve(&self, run_id: &str, artifact_path: &str) -> Result<PathBuf> {
        if !is_single_segment(run_id) {
            return Err(ModelError::Registry(format!("invalid run id: {}", run_id)));
        }

        let relative = Path::new(artifact_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if artifact_path.is_empty() || escapes {
            return Err(ModelError::ArtifactNotFound {
                run_id: run_id.to_string(),
                path: artifact_path.to_string(),
            });
        }

        Ok(self.root.join(run_id).join("artifacts").join(relative))
    }
}

fn is_single_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[tonic::async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn download(&self, run_id: &str, artifact_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve(run_id, artifact_path)?;
        debug!("Reading artifact {}", path.display());

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModelError::ArtifactNotFound {
                run_id: run_id.to_string(),
                path: artifact_path.to_string(),
            },
            _ => ModelError::IoError(e),
        })
    }
}
