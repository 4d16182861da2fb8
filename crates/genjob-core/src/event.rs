//! Job lifecycle events delivered to observers.

use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::status::JobStatus;

/// A status or progress change of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    StatusChanged { job_id: JobId, status: JobStatus },
    ProgressChanged { job_id: JobId, progress: f32 },
}

impl JobEvent {
    /// Job this event belongs to.
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::StatusChanged { job_id, .. } | Self::ProgressChanged { job_id, .. } => job_id,
        }
    }

    /// The new status, if this is a status event.
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            Self::StatusChanged { status, .. } => Some(*status),
            Self::ProgressChanged { .. } => None,
        }
    }

    /// The new progress, if this is a progress event.
    pub fn progress(&self) -> Option<f32> {
        match self {
            Self::ProgressChanged { progress, .. } => Some(*progress),
            Self::StatusChanged { .. } => None,
        }
    }
}
