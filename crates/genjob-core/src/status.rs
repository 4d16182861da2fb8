//! Status enums for remote tasks and jobs.

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle of a single remote task.
///
/// `Queued` and `InProgress` may alternate while polling; `Succeeded` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTaskStatus {
    /// Not yet accepted by the remote, or accepted and waiting for a worker.
    #[default]
    Queued,
    /// The remote is processing the task.
    InProgress,
    /// The task finished and its result payload was captured.
    Succeeded,
    /// The task failed, locally or remotely.
    Failed,
}

impl RemoteTaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the remote is still working on the task.
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Parse a status string as reported by the remote API.
    ///
    /// Matching is case-insensitive. Unknown values are treated as `Failed`.
    pub fn from_remote(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "succeeded" => Self::Succeeded,
            _ => Self::Failed,
        }
    }
}

impl<'de> Deserialize<'de> for RemoteTaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .as_deref()
            .map(Self::from_remote)
            .unwrap_or(Self::Failed))
    }
}

/// Status of a generation job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job created but not yet started.
    #[default]
    Pending,
    /// Job is executing its stages.
    Running,
    /// Job produced its artifact.
    Completed,
    /// Job stopped on an unrecoverable failure (or was cancelled).
    Failed,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the job is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_parsing() {
        assert_eq!(RemoteTaskStatus::from_remote("queued"), RemoteTaskStatus::Queued);
        assert_eq!(
            RemoteTaskStatus::from_remote("IN_PROGRESS"),
            RemoteTaskStatus::InProgress
        );
        assert_eq!(
            RemoteTaskStatus::from_remote("Succeeded"),
            RemoteTaskStatus::Succeeded
        );
        assert_eq!(RemoteTaskStatus::from_remote("exploded"), RemoteTaskStatus::Failed);
    }

    #[test]
    fn test_remote_status_null_is_failed() {
        let status: RemoteTaskStatus = serde_json::from_str("null").unwrap();
        assert_eq!(status, RemoteTaskStatus::Failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(RemoteTaskStatus::Succeeded.is_terminal());
        assert!(RemoteTaskStatus::InProgress.is_pending());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Running.is_active());
    }
}
