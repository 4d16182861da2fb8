//! Durable storage for completed artifacts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use genjob_core::{Artifact, ArtifactId, ArtifactKind, FileRole};

const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    #[error("staged file missing: {0}")]
    MissingFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Receives completed artifacts before their staging directory is removed.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Copy the artifact's files out of `staging` and record its descriptor.
    async fn persist(&self, artifact: &Artifact, staging: &Path) -> Result<(), StoreError>;
}

/// Stores each artifact in `<root>/<artifact id>/` next to a `metadata.json`.
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

    /// Directory holding an artifact's files.
    pub fn artifact_dir(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Absolute path of the file playing `role`, if the artifact has one.
    pub fn file_path(&self, artifact: &Artifact, role: &FileRole) -> Option<PathBuf> {
        artifact
            .file(role)
            .map(|f| self.artifact_dir(&artifact.id).join(&f.file_name))
    }

    /// All stored artifacts, newest first.
    ///
    /// Entries with unreadable metadata are skipped.
    pub async fn list(&self) -> Result<Vec<Artifact>, StoreError> {
        let mut artifacts = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(artifacts),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match read_metadata(&entry.path()).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable artifact"),
            }
        }

        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }

    /// Stored artifacts of one kind, newest first.
    pub async fn list_by_kind(&self, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError> {
        let mut artifacts = self.list().await?;
        artifacts.retain(|a| a.kind == kind);
        Ok(artifacts)
    }

    pub async fn get(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        let dir = self.checked_dir(id)?;
        match read_metadata(&dir).await {
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.clone()))
            }
            other => other,
        }
    }

    /// Remove an artifact and all of its files.
    pub async fn delete(&self, id: &ArtifactId) -> Result<(), StoreError> {
        let dir = self.checked_dir(id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(artifact_id = %id, "Artifact deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark or unmark an artifact as a favorite.
    pub async fn set_favorite(
        &self,
        id: &ArtifactId,
        favorite: bool,
    ) -> Result<Artifact, StoreError> {
        let mut artifact = self.get(id).await?;
        artifact.favorite = favorite;
        write_metadata(&self.artifact_dir(id), &artifact).await?;
        Ok(artifact)
    }

    fn checked_dir(&self, id: &ArtifactId) -> Result<PathBuf, StoreError> {
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(['/', '\\']) || raw.starts_with('.') {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(self.artifact_dir(id))
    }

    async fn copy_files(&self, artifact: &Artifact, staging: &Path, dir: &Path) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        for file in &artifact.files {
            let src = staging.join(&file.file_name);
            if !tokio::fs::try_exists(&src).await? {
                return Err(StoreError::MissingFile(file.file_name.clone()));
            }
            tokio::fs::copy(&src, dir.join(&file.file_name)).await?;
            debug!(artifact_id = %artifact.id, file = %file.file_name, "Copied artifact file");
        }
        write_metadata(dir, artifact).await
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, artifact: &Artifact, staging: &Path) -> Result<(), StoreError> {
        let dir = self.artifact_dir(&artifact.id);
        if let Err(e) = self.copy_files(artifact, staging, &dir).await {
            // Drop the partial copy.
            let _ = tokio::fs::remove_dir_all(&dir).await;
            return Err(e);
        }
        info!(artifact_id = %artifact.id, kind = ?artifact.kind, files = artifact.files.len(), "Artifact persisted");
        Ok(())
    }
}

async fn read_metadata(dir: &Path) -> Result<Artifact, StoreError> {
    let data = tokio::fs::read(dir.join(METADATA_FILE)).await?;
    Ok(serde_json::from_slice(&data)?)
}

async fn write_metadata(dir: &Path, artifact: &Artifact) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(artifact)?;
    tokio::fs::write(dir.join(METADATA_FILE), data).await?;
    Ok(())
}
