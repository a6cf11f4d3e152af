//! The staging file handed to the graph server's `LOAD CSV`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MigrationError, Result};

/// A single well-known file that holds one serialized page at a time.
#[derive(Debug, Clone)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the local path of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the staging file with `text`, creating parent directories.
    ///
    /// ## Errors
    ///
    /// Returns [`MigrationError::Io`] if the directory or file cannot be
    /// written.
    pub async fn write(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MigrationError::io(parent, e))?;
        }

        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| MigrationError::io(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = text.len(), "staging file written");
        Ok(())
    }

    /// Removes the staging file. Best-effort: failures are logged, never returned.
    pub async fn remove(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "staging file removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "staging file already absent");
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staging file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_creates_parents_and_overwrites() {
        let dir = tempdir().unwrap();
        let staging = StagingFile::new(dir.path().join("import").join("import_data.csv"));

        staging.write("first").await.unwrap();
        staging.write("second").await.unwrap();

        let contents = std::fs::read_to_string(staging.path()).unwrap();
        assert_eq!(contents, "second");
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let dir = tempdir().unwrap();
        let staging = StagingFile::new(dir.path().join("import_data.csv"));
        staging.write("x").await.unwrap();

        staging.remove().await;

        assert!(!staging.path().exists());
    }

    #[tokio::test]
    async fn remove_of_absent_file_is_silent() {
        let dir = tempdir().unwrap();
        let staging = StagingFile::new(dir.path().join("never_written.csv"));
        staging.remove().await;
        assert!(!staging.path().exists());
    }

    #[tokio::test]
    async fn write_into_a_file_path_fails_with_io() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let staging = StagingFile::new(blocker.join("import_data.csv"));
        let err = staging.write("x").await.unwrap_err();

        assert!(matches!(err, MigrationError::Io { .. }));
    }
}
