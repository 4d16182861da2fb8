//! Job-level errors.

use thiserror::Error;

use genjob_client::TransportError;
use genjob_core::CoreError;

use crate::capture::CaptureError;
use crate::mesh::MeshError;
use crate::remote_task::TaskFailure;
use crate::store::StoreError;

/// Why a job ended `Failed`.
///
/// Recorded on the job and surfaced through its status; never propagated
/// out of [`crate::Job::execute`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    #[error("{stage} failed: {failure}")]
    RemoteTask {
        stage: &'static str,
        failure: TaskFailure,
    },

    #[error("failed to download {file}: {source}")]
    Download {
        file: String,
        #[source]
        source: TransportError,
    },

    #[error("result has no {0} url")]
    MissingUrl(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mesh processing failed: {0}")]
    Mesh(#[from] MeshError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("scene capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("failed to persist artifact: {0}")]
    Persist(#[from] StoreError),

    #[error("background work failed: {0}")]
    Background(String),

    #[error("scene texturing needs a scene host")]
    MissingSceneHost,

    #[error("cancelled")]
    Cancelled,
}

impl JobError {
    /// Wrap a remote task failure, keeping cancellation distinct.
    pub fn remote(stage: &'static str, failure: TaskFailure) -> Self {
        match failure {
            TaskFailure::Cancelled => Self::Cancelled,
            failure => Self::RemoteTask { stage, failure },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_task_maps_to_cancelled_job() {
        assert!(JobError::remote("preview", TaskFailure::Cancelled).is_cancelled());
        let err = JobError::remote("preview", TaskFailure::Unauthorized);
        assert_eq!(err.to_string(), "preview failed: unauthorized: check the API key");
    }
}
