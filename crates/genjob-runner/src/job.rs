//! A user-visible generation job and the context it runs in.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use genjob_client::Transport;
use genjob_core::{
    Artifact, ArtifactId, JobEvent, JobId, JobKind, JobRequest, JobStatus, RemoteTaskId,
    RemoteTaskStatus, TaskPayload,
};

use crate::capture::SceneHost;
use crate::config::{RetryPolicy, RunnerConfig};
use crate::error::JobError;
use crate::mesh::{GlbProcessor, MeshProcessor};
use crate::observer::Listeners;
use crate::pipeline;
use crate::remote_task::{RemoteTask, TaskFailure, TaskRequest};
use crate::staging::StagingDir;
use crate::store::ArtifactStore;

/// Collaborators shared by every job a controller runs.
#[derive(Clone)]
pub struct JobContext {
    /// Remote API.
    pub transport: Arc<dyn Transport>,

    /// Retry envelope for every remote task.
    pub retry: RetryPolicy,

    /// Mesh post-processing for the mesh pipelines.
    pub mesh: Arc<dyn MeshProcessor>,

    /// Where completed artifacts are persisted. `None` keeps them only in
    /// memory.
    pub store: Option<Arc<dyn ArtifactStore>>,

    /// Scene host for scene texturing.
    pub scene: Option<Arc<dyn SceneHost>>,

    /// Size of projected textures.
    pub texture_size: u32,

    /// Size of scene captures.
    pub capture_size: u32,
}

impl JobContext {
    pub fn new(transport: Arc<dyn Transport>, config: &RunnerConfig) -> Self {
        Self {
            transport,
            retry: config.retry.clone(),
            mesh: Arc::new(GlbProcessor),
            store: None,
            scene: None,
            texture_size: config.texture_size,
            capture_size: config.capture_size,
        }
    }

    /// Builder method to persist completed artifacts.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builder method to enable scene texturing.
    pub fn with_scene_host(mut self, scene: Arc<dyn SceneHost>) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Builder method to replace the mesh processor.
    pub fn with_mesh_processor(mut self, mesh: Arc<dyn MeshProcessor>) -> Self {
        self.mesh = mesh;
        self
    }
}

/// Output of a finished remote stage.
#[derive(Debug, Clone)]
pub(crate) struct StageResult {
    pub remote_id: RemoteTaskId,
    pub payload: TaskPayload,
}

#[derive(Debug, Default)]
struct JobState {
    status: JobStatus,
    progress: f32,
    artifact: Option<Artifact>,
    error: Option<JobError>,
}

/// A generation job.
///
/// Owns its staging directory, which is removed once the job reaches a
/// terminal status. Progress never decreases and reaches 1.0 only together
/// with `Completed`.
pub struct Job {
    id: JobId,
    request: JobRequest,
    created_at: DateTime<Utc>,
    staging: StagingDir,
    state: Mutex<JobState>,
    listeners: Listeners<JobEvent>,
    cancel: CancellationToken,
}

impl Job {
    /// Create a pending job and its staging directory under `staging_root`.
    pub async fn new(request: JobRequest, staging_root: &Path) -> Result<Self, JobError> {
        request.validate()?;
        let id = JobId::generate();
        let staging = StagingDir::create(staging_root, &id).await?;
        debug!(job_id = %id, kind = %request.kind(), "Job created");

        Ok(Self {
            id,
            request,
            created_at: Utc::now(),
            staging,
            state: Mutex::new(JobState::default()),
            listeners: Listeners::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.request.kind()
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn progress(&self) -> f32 {
        self.lock().progress
    }

    /// The produced artifact, once completed.
    pub fn artifact(&self) -> Option<Artifact> {
        self.lock().artifact.clone()
    }

    pub fn artifact_id(&self) -> Option<ArtifactId> {
        self.lock().artifact.as_ref().map(|a| a.id.clone())
    }

    /// Failure message, once failed.
    pub fn error(&self) -> Option<String> {
        self.lock().error.as_ref().map(ToString::to_string)
    }

    /// True if the job failed because it was cancelled.
    pub fn was_cancelled(&self) -> bool {
        self.lock()
            .error
            .as_ref()
            .is_some_and(JobError::is_cancelled)
    }

    pub fn staging(&self) -> &StagingDir {
        &self.staging
    }

    /// Subscribe to status and progress changes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        self.listeners.subscribe()
    }

    /// Abort in-flight requests and waits; the job ends `Failed`.
    ///
    /// A job that never started is failed here and its staging directory
    /// removed, since no pipeline will run to do it.
    pub async fn cancel(&self) {
        if self.status().is_active() {
            info!(job_id = %self.id, "Cancelling job");
        }
        self.cancel.cancel();

        {
            let mut state = self.lock();
            if state.status != JobStatus::Pending {
                return;
            }
            state.status = JobStatus::Failed;
            state.error = Some(JobError::Cancelled);
        }
        self.cleanup().await;
        warn!(job_id = %self.id, "Job cancelled before it started");
        self.listeners.notify(JobEvent::StatusChanged {
            job_id: self.id.clone(),
            status: JobStatus::Failed,
        });
    }

    /// Run the job to a terminal status and return it.
    ///
    /// Only a pending job runs; on any other job this returns the current
    /// status. Failures are recorded on the job, never returned.
    pub async fn execute(&self, ctx: &JobContext) -> JobStatus {
        {
            let mut state = self.lock();
            if state.status != JobStatus::Pending {
                return state.status;
            }
            state.status = JobStatus::Running;
        }
        self.listeners.notify(JobEvent::StatusChanged {
            job_id: self.id.clone(),
            status: JobStatus::Running,
        });
        info!(job_id = %self.id, kind = %self.kind(), "Job started");

        let outcome = match &self.request {
            JobRequest::TextToMesh(params) => pipeline::text_to_mesh::run(self, ctx, params).await,
            JobRequest::ImageToMesh(params) => {
                pipeline::image_to_mesh::run(self, ctx, params).await
            }
            JobRequest::TextToMaterial(params) => {
                pipeline::text_to_material::run(self, ctx, params).await
            }
            JobRequest::SceneTexturing(params) => {
                pipeline::scene_texturing::run(self, ctx, params).await
            }
        };

        match outcome {
            Ok(artifact) => self.complete(ctx, artifact).await,
            Err(err) => self.fail(err).await,
        }
        self.status()
    }

    /// Raise progress to `progress`. Lower values, values of 1.0 and
    /// updates outside `Running` are ignored.
    pub(crate) fn advance(&self, progress: f32) {
        {
            let mut state = self.lock();
            if state.status != JobStatus::Running
                || progress.is_nan()
                || progress >= 1.0
                || progress <= state.progress
            {
                return;
            }
            state.progress = progress;
        }
        debug!(job_id = %self.id, progress, "Job progress");
        self.listeners.notify(JobEvent::ProgressChanged {
            job_id: self.id.clone(),
            progress,
        });
    }

    pub(crate) fn ensure_active(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    /// Run one remote stage to completion.
    pub(crate) async fn run_remote(
        &self,
        ctx: &JobContext,
        stage: &'static str,
        request: TaskRequest,
    ) -> Result<StageResult, JobError> {
        self.ensure_active()?;
        info!(job_id = %self.id, stage, "Stage started");

        let mut task = RemoteTask::new(request, ctx.transport.clone(), ctx.retry.clone())
            .with_cancellation(self.cancel.child_token());

        if task.execute().await != RemoteTaskStatus::Succeeded {
            let failure = task
                .failure()
                .cloned()
                .unwrap_or_else(|| TaskFailure::Fatal("task ended without a result".into()));
            return Err(JobError::remote(stage, failure));
        }

        let remote_id = task.remote_id().cloned();
        match (remote_id, task.into_result()) {
            (Some(remote_id), Some(payload)) => {
                info!(job_id = %self.id, stage, remote_id = %remote_id, "Stage finished");
                Ok(StageResult { remote_id, payload })
            }
            _ => Err(JobError::remote(
                stage,
                TaskFailure::Fatal("task ended without a result".into()),
            )),
        }
    }

    /// Download a result file into the staging directory.
    pub(crate) async fn download(
        &self,
        ctx: &JobContext,
        url: Option<&str>,
        channel: &'static str,
        file_name: &str,
    ) -> Result<PathBuf, JobError> {
        let url = url.ok_or(JobError::MissingUrl(channel))?;
        let bytes = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(JobError::Cancelled),
            result = ctx.transport.download(url) => result,
        }
        .map_err(|source| JobError::Download {
            file: file_name.to_string(),
            source,
        })?;

        let path = self.staging.write(file_name, &bytes).await?;
        debug!(job_id = %self.id, file = file_name, bytes = bytes.len(), "Downloaded result file");
        Ok(path)
    }

    /// Persist, clean up and enter `Completed`. A persistence failure fails
    /// the job instead.
    async fn complete(&self, ctx: &JobContext, artifact: Artifact) {
        if let Some(store) = &ctx.store {
            if let Err(err) = store.persist(&artifact, self.staging.path()).await {
                return self.fail(err.into()).await;
            }
        }
        self.cleanup().await;

        let artifact_id = artifact.id.clone();
        {
            let mut state = self.lock();
            state.progress = 1.0;
            state.status = JobStatus::Completed;
            state.artifact = Some(artifact);
        }
        self.listeners.notify(JobEvent::ProgressChanged {
            job_id: self.id.clone(),
            progress: 1.0,
        });
        self.listeners.notify(JobEvent::StatusChanged {
            job_id: self.id.clone(),
            status: JobStatus::Completed,
        });
        info!(job_id = %self.id, artifact_id = %artifact_id, "Job completed");
    }

    async fn fail(&self, err: JobError) {
        self.cleanup().await;

        if err.is_cancelled() {
            warn!(job_id = %self.id, "Job cancelled");
        } else {
            error!(job_id = %self.id, kind = %self.kind(), error = %err, "Job failed");
        }
        {
            let mut state = self.lock();
            state.status = JobStatus::Failed;
            state.error = Some(err);
        }
        self.listeners.notify(JobEvent::StatusChanged {
            job_id: self.id.clone(),
            status: JobStatus::Failed,
        });
    }

    async fn cleanup(&self) {
        if let Err(e) = self.staging.remove().await {
            warn!(job_id = %self.id, path = %self.staging.path().display(), error = %e, "Failed to remove staging directory");
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("status", &state.status)
            .field("progress", &state.progress)
            .finish()
    }
}
