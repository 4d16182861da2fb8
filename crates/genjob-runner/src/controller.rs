//! Creates, registers and runs jobs.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use genjob_core::{ArtifactId, JobId, JobKind, JobRequest, JobStatus};

use crate::config::RunnerConfig;
use crate::error::JobError;
use crate::job::{Job, JobContext};
use crate::observer::Listeners;
use crate::registry::JobRegistry;

/// Entry point for running generation jobs.
///
/// Every job it creates stays in the registry, completed or not, until it
/// is removed.
pub struct JobController {
    registry: Arc<RwLock<JobRegistry>>,
    ctx: JobContext,
    staging_root: PathBuf,
    job_added: Listeners<JobId>,
}

impl JobController {
    pub fn new(ctx: JobContext, config: &RunnerConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(JobRegistry::new())),
            ctx,
            staging_root: config.staging_root.clone(),
            job_added: Listeners::new(),
        }
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    /// Shared handle to the registry.
    pub fn registry(&self) -> Arc<RwLock<JobRegistry>> {
        self.registry.clone()
    }

    /// Subscribe to the ids of newly registered jobs.
    pub fn subscribe_jobs(&self) -> mpsc::UnboundedReceiver<JobId> {
        self.job_added.subscribe()
    }

    /// Create and register a pending job without starting it.
    pub async fn create(&self, request: JobRequest) -> Result<Arc<Job>, JobError> {
        let job = Arc::new(Job::new(request, &self.staging_root).await?);
        self.registry.write().await.add(job.clone());
        info!(job_id = %job.id(), kind = %job.kind(), "Job registered");
        self.job_added.notify(job.id().clone());
        Ok(job)
    }

    /// Run a registered job on the calling task.
    pub async fn execute(&self, job: &Job) -> JobStatus {
        job.execute(&self.ctx).await
    }

    /// Run a registered job in the background.
    pub fn spawn(&self, job: Arc<Job>) -> JoinHandle<JobStatus> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move { job.execute(&ctx).await })
    }

    /// Create, register and start a job in the background.
    pub async fn submit(&self, request: JobRequest) -> Result<Arc<Job>, JobError> {
        let job = self.create(request).await?;
        self.spawn(job.clone());
        Ok(job)
    }

    /// Create, register and run a job to completion.
    pub async fn run(&self, request: JobRequest) -> Result<Arc<Job>, JobError> {
        let job = self.create(request).await?;
        self.execute(&job).await;
        Ok(job)
    }

    /// Cancel a job. Returns false if no such job is registered.
    pub async fn cancel(&self, id: &JobId) -> bool {
        match self.get(id).await {
            Some(job) => {
                job.cancel().await;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.registry.read().await.get(id)
    }

    pub async fn get_by_artifact(&self, artifact_id: &ArtifactId) -> Option<Arc<Job>> {
        self.registry.read().await.get_by_artifact(artifact_id)
    }

    pub async fn get_by_kind(&self, kind: JobKind) -> Vec<Arc<Job>> {
        self.registry.read().await.get_by_kind(kind)
    }

    pub async fn jobs(&self) -> Vec<Arc<Job>> {
        self.registry.read().await.all()
    }

    /// Unregister a job. A job that has not finished is cancelled.
    pub async fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        let job = self.registry.write().await.remove(id)?;
        job.cancel().await;
        Some(job)
    }

    /// Unregister every job of `kind`, cancelling those not yet finished.
    pub async fn remove_all_of_kind(&self, kind: JobKind) -> usize {
        let removed = self.registry.write().await.remove_all_of_kind(kind);
        for job in &removed {
            job.cancel().await;
        }
        removed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use genjob_core::{GenerationSettings, TextToMaterialParams};

    use crate::testing::{payload, ScriptedTransport};

    fn material() -> JobRequest {
        JobRequest::TextToMaterial(TextToMaterialParams {
            settings: GenerationSettings::new("rusty metal"),
        })
    }

    fn controller(transport: ScriptedTransport, root: &std::path::Path) -> JobController {
        let config = RunnerConfig::default().with_staging_root(root);
        JobController::new(JobContext::new(Arc::new(transport), &config), &config)
    }

    #[tokio::test]
    async fn test_create_registers_and_notifies() {
        let root = tempfile::tempdir().unwrap();
        let controller = controller(ScriptedTransport::new(), root.path());
        let mut added = controller.subscribe_jobs();

        let job = controller.create(material()).await.unwrap();

        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(added.try_recv().unwrap(), *job.id());
        assert!(controller.get(job.id()).await.is_some());
        assert_eq!(controller.get_by_kind(JobKind::TextToMaterial).await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_registered() {
        let root = tempfile::tempdir().unwrap();
        let controller = controller(ScriptedTransport::new(), root.path());

        let request = JobRequest::TextToMaterial(TextToMaterialParams {
            settings: GenerationSettings::new("  "),
        });
        assert!(controller.create(request).await.is_err());
        assert!(controller.jobs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_background_job() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new().with_default_poll("in_progress");
        transport.push_submit(Ok(payload("m1", "queued")));
        let controller = controller(transport, root.path());

        let job = controller.create(material()).await.unwrap();
        let handle = controller.spawn(job.clone());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(job.status(), JobStatus::Running);

        assert!(controller.cancel(job.id()).await);
        assert_eq!(handle.await.unwrap(), JobStatus::Failed);
        assert!(job.was_cancelled());
        assert!(!job.staging().exists());
        assert!(!controller.cancel(&JobId::new("unknown")).await);
    }

    #[tokio::test]
    async fn test_removing_pending_job_deletes_staging() {
        let root = tempfile::tempdir().unwrap();
        let controller = controller(ScriptedTransport::new(), root.path());

        let job = controller.create(material()).await.unwrap();
        let staging = job.staging().path().to_path_buf();
        assert!(staging.exists());

        let removed = controller.remove(job.id()).await.unwrap();
        assert_eq!(removed.status(), JobStatus::Failed);
        assert!(removed.was_cancelled());
        drop(removed);
        drop(job);
        assert!(!staging.exists());

        let a = controller.create(material()).await.unwrap();
        let b = controller.create(material()).await.unwrap();
        assert_eq!(controller.remove_all_of_kind(JobKind::TextToMaterial).await, 2);
        assert!(!a.staging().exists());
        assert!(!b.staging().exists());
        assert!(!root.path().join("jobs").join(a.id().as_str()).exists());
    }

    #[tokio::test]
    async fn test_run_keeps_failed_job_registered() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        transport.push_submit(Err(crate::testing::http_error(401)));
        let controller = controller(transport, root.path());

        let job = controller.run(material()).await.unwrap();

        assert_eq!(job.status(), JobStatus::Failed);
        assert!(controller.get(job.id()).await.is_some());

        assert_eq!(controller.remove_all_of_kind(JobKind::TextToMaterial).await, 1);
        assert!(controller.get(job.id()).await.is_none());
    }
}
