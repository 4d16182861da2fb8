//! genjob Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Filesystem layout
//! - Runtime specifics
//!
//! All types here describe generation jobs, the remote tasks they drive and
//! the artifacts they produce.

pub mod artifact;
pub mod error;
pub mod event;
pub mod ids;
pub mod job;
pub mod model;
pub mod status;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactFile, ArtifactKind, FileRole};
pub use error::CoreError;
pub use event::JobEvent;
pub use ids::{ArtifactId, JobId, RemoteTaskId};
pub use job::{
    GenerationSettings, ImageToMeshParams, JobKind, JobRequest, ReferenceImage,
    SceneTexturingParams, TextToMaterialParams, TextToMeshParams,
};
pub use model::{BillingInfo, RemoteTaskKind, TaskPayload, TaskUrls};
pub use status::{JobStatus, RemoteTaskStatus};
