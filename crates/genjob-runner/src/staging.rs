//! Per-job scratch directories.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use genjob_core::JobId;

/// Scratch directory owned by exactly one job: `<root>/jobs/<job id>`.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create the staging directory for a job.
    pub async fn create(root: &Path, job_id: &JobId) -> io::Result<Self> {
        let path = root.join("jobs").join(job_id.as_str());
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created staging directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a file into the directory.
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.file(name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Delete the directory and everything in it. Missing is not an error.
    pub async fn remove(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed staging directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::new("job-1");
        let staging = StagingDir::create(root.path(), &job_id).await.unwrap();

        assert_eq!(staging.path(), root.path().join("jobs").join("job-1"));
        assert!(staging.exists());

        let file = staging.write("albedo.png", b"png").await.unwrap();
        assert_eq!(std::fs::read(file).unwrap(), b"png");

        staging.remove().await.unwrap();
        assert!(!staging.exists());
        staging.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_jobs_get_distinct_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingDir::create(root.path(), &JobId::generate()).await.unwrap();
        let b = StagingDir::create(root.path(), &JobId::generate()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }
}
