//! In-memory index of jobs by id and by kind.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use genjob_core::{ArtifactId, JobId, JobKind};

use crate::job::Job;

/// All jobs known to a controller, completed or not.
///
/// The id map and the kind groups always hold the same set of jobs. Nothing
/// here is persisted.
#[derive(Debug, Default)]
pub struct JobRegistry {
    by_id: HashMap<JobId, Arc<Job>>,
    by_kind: HashMap<JobKind, HashSet<JobId>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Re-adding a job with the same id replaces it.
    pub fn add(&mut self, job: Arc<Job>) {
        let id = job.id().clone();
        if let Some(previous) = self.by_id.insert(id.clone(), job.clone()) {
            self.unlink(previous.kind(), &id);
        }
        self.by_kind.entry(job.kind()).or_default().insert(id);
    }

    /// Remove a job, returning it if it was registered.
    pub fn remove(&mut self, id: &JobId) -> Option<Arc<Job>> {
        let job = self.by_id.remove(id)?;
        self.unlink(job.kind(), id);
        Some(job)
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.by_id.get(id).cloned()
    }

    /// The job that produced `artifact_id`.
    pub fn get_by_artifact(&self, artifact_id: &ArtifactId) -> Option<Arc<Job>> {
        self.by_id
            .values()
            .find(|job| job.artifact_id().as_ref() == Some(artifact_id))
            .cloned()
    }

    /// Jobs of one kind, in no particular order.
    pub fn get_by_kind(&self, kind: JobKind) -> Vec<Arc<Job>> {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    /// Remove every job of `kind`, returning them.
    pub fn remove_all_of_kind(&mut self, kind: JobKind) -> Vec<Arc<Job>> {
        self.by_kind
            .remove(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.remove(&id))
            .collect()
    }

    /// All registered jobs, oldest first.
    pub fn all(&self) -> Vec<Arc<Job>> {
        let mut jobs: Vec<_> = self.by_id.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at());
        jobs
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn unlink(&mut self, kind: JobKind, id: &JobId) {
        if let Some(ids) = self.by_kind.get_mut(&kind) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_kind.remove(&kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genjob_core::{GenerationSettings, JobRequest, TextToMaterialParams, TextToMeshParams};

    async fn job(root: &std::path::Path, kind: JobKind) -> Arc<Job> {
        let settings = GenerationSettings::new("crate");
        let request = match kind {
            JobKind::TextToMaterial => JobRequest::TextToMaterial(TextToMaterialParams { settings }),
            _ => JobRequest::TextToMesh(TextToMeshParams {
                settings,
                face_limit: None,
                pbr: false,
            }),
        };
        Arc::new(Job::new(request, root).await.unwrap())
    }

    #[tokio::test]
    async fn test_add_and_remove_keep_indexes_consistent() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = JobRegistry::new();
        let mesh = job(root.path(), JobKind::TextToMesh).await;
        let material = job(root.path(), JobKind::TextToMaterial).await;

        registry.add(mesh.clone());
        registry.add(material.clone());

        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get(mesh.id()).unwrap(), &mesh));
        let meshes = registry.get_by_kind(JobKind::TextToMesh);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].id(), mesh.id());

        let removed = registry.remove(mesh.id()).unwrap();
        assert_eq!(removed.id(), mesh.id());
        assert!(registry.get(mesh.id()).is_none());
        assert!(registry.get_by_kind(JobKind::TextToMesh).is_empty());
        assert!(registry.remove(mesh.id()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_all_of_kind() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = JobRegistry::new();
        for _ in 0..3 {
            registry.add(job(root.path(), JobKind::TextToMesh).await);
        }
        let material = job(root.path(), JobKind::TextToMaterial).await;
        registry.add(material.clone());

        assert_eq!(registry.remove_all_of_kind(JobKind::TextToMesh).len(), 3);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(material.id()).is_some());
        assert!(registry.remove_all_of_kind(JobKind::ImageToMesh).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_by_artifact_ignores_unfinished_jobs() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = JobRegistry::new();
        registry.add(job(root.path(), JobKind::TextToMesh).await);

        assert!(registry
            .get_by_artifact(&ArtifactId::new("not-produced"))
            .is_none());
    }

    #[tokio::test]
    async fn test_readding_job_does_not_duplicate() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = JobRegistry::new();
        let mesh = job(root.path(), JobKind::TextToMesh).await;

        registry.add(mesh.clone());
        registry.add(mesh.clone());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_by_kind(JobKind::TextToMesh).len(), 1);
    }
}
