//! genjob Runner
//!
//! Drives generation jobs against the remote API: the submit/poll retry
//! state machine for individual remote tasks, the per-kind pipelines that
//! sequence them, local mesh and texture post-processing, artifact
//! persistence and the in-memory job registry.

pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod mesh;
pub mod observer;
mod pipeline;
pub mod projection;
pub mod registry;
pub mod remote_task;
pub mod staging;
pub mod store;

#[cfg(test)]
mod testing;

pub use capture::{CaptureError, RenderPass, SceneCamera, SceneHost, SceneMesh};
pub use config::{RetryPolicy, RunnerConfig};
pub use controller::JobController;
pub use error::JobError;
pub use job::{Job, JobContext};
pub use mesh::{GlbProcessor, MeshError, MeshProcessor, TextureSlot};
pub use registry::JobRegistry;
pub use remote_task::{RemoteTask, TaskFailure, TaskRequest};
pub use store::{ArtifactStore, FsArtifactStore, StoreError};
