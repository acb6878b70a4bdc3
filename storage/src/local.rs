//! Local filesystem sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use llmbench_core::{ArtifactKind, PersistenceSink, RunId, StorageError};

/// Writes artifacts to `{dir}/{run:03}.{kind}.txt`
///
/// The directory (and its parents) is created before each write.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    /// Create a sink rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `(run, kind)`
    pub fn artifact_path(&self, run: RunId, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}.{}.txt", run, kind))
    }
}

#[async_trait]
impl PersistenceSink for LocalStorage {
    async fn store(
        &self,
        run: RunId,
        kind: ArtifactKind,
        content: &[u8],
    ) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.dir.display().to_string(),
                source,
            })?;

        let path = self.artifact_path(run, kind);
        let location = path.display().to_string();

        tokio::fs::write(&path, content)
            .await
            .map_err(|source| StorageError::Write {
                path: location.clone(),
                source,
            })?;

        tracing::trace!(run = run.0, kind = %kind, path = %location, "Artifact written");

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_creates_dir_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("runs").join("nested");
        let storage = LocalStorage::new(&root);

        let location = storage
            .store(RunId(7), ArtifactKind::Response, b"Hello")
            .await
            .unwrap();

        let expected = root.join("007.response.txt");
        assert_eq!(location, expected.display().to_string());
        assert_eq!(std::fs::read_to_string(&expected).unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_store_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage
            .store(RunId(1), ArtifactKind::Response, b"Hel")
            .await
            .unwrap();
        storage
            .store(RunId(1), ArtifactKind::Response, b"Hello")
            .await
            .unwrap();
        storage
            .store(RunId(1), ArtifactKind::Metrics, b"{\"run\":1}")
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("001.response.txt")).unwrap(),
            "Hello"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("001.metrics.txt")).unwrap(),
            "{\"run\":1}"
        );
    }

    #[tokio::test]
    async fn test_store_reports_create_dir_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let storage = LocalStorage::new(blocker.join("runs"));
        let err = storage
            .store(RunId(1), ArtifactKind::Metrics, b"{}")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::CreateDir { .. }));
        assert!(err.to_string().starts_with("error creating directory"));
    }

    #[test]
    fn test_artifact_path_padding() {
        let storage = LocalStorage::new("./runs");
        assert_eq!(
            storage.artifact_path(RunId(123), ArtifactKind::Metrics),
            PathBuf::from("./runs/123.metrics.txt")
        );
        assert_eq!(
            storage.artifact_path(RunId(1234), ArtifactKind::Response),
            PathBuf::from("./runs/1234.response.txt")
        );
    }
}
