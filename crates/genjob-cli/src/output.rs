//! Job progress output: human-readable lines or JSON events on stdout.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use genjob_core::{Artifact, JobEvent, JobId, JobKind, JobStatus};

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    JobCreated,
    JobStatus,
    JobProgress,
    JobCompleted,
    JobFailed,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

pub fn job_created(job_id: &JobId, kind: JobKind) {
    if is_json_mode() {
        JsonEvent::new(
            JsonEventType::JobCreated,
            serde_json::json!({ "job_id": job_id, "kind": kind }),
        )
        .emit();
    } else {
        println!("Job {} ({}) created", job_id, kind);
    }
}

/// Report a status or progress change.
pub fn job_event(event: &JobEvent) {
    if is_json_mode() {
        let (kind, data) = match event {
            JobEvent::StatusChanged { job_id, status } => (
                JsonEventType::JobStatus,
                serde_json::json!({ "job_id": job_id, "status": status }),
            ),
            JobEvent::ProgressChanged { job_id, progress } => (
                JsonEventType::JobProgress,
                serde_json::json!({ "job_id": job_id, "progress": progress }),
            ),
        };
        JsonEvent::new(kind, data).emit();
        return;
    }

    match event {
        JobEvent::StatusChanged { status, .. } => println!("  status:   {}", status_name(*status)),
        JobEvent::ProgressChanged { progress, .. } => {
            println!("  progress: {:>3.0}%", progress * 100.0)
        }
    }
}

pub fn job_completed(job_id: &JobId, artifact: &Artifact, location: &str) {
    if is_json_mode() {
        JsonEvent::new(
            JsonEventType::JobCompleted,
            serde_json::json!({
                "job_id": job_id,
                "artifact": artifact,
                "location": location,
            }),
        )
        .emit();
        return;
    }

    println!("Artifact {} saved to {}", artifact.id, location);
    for file in &artifact.files {
        println!("  {:<20}  {:?}", file.file_name, file.role);
    }
}

pub fn job_failed(job_id: &JobId, error: &str) {
    if is_json_mode() {
        JsonEvent::new(
            JsonEventType::JobFailed,
            serde_json::json!({ "job_id": job_id, "error": error }),
        )
        .emit();
    } else {
        eprintln!("Job {} failed: {}", job_id, error);
    }
}

/// Print a list of stored artifacts.
pub fn artifacts(artifacts: &[Artifact]) {
    if is_json_mode() {
        if let Ok(json) = serde_json::to_string(artifacts) {
            println!("{}", json);
        }
        return;
    }

    println!("Artifacts ({}):", artifacts.len());
    println!(
        "{:<8}  {:<10}  {:<3}  {:<19}  {}",
        "ID", "KIND", "FAV", "CREATED", "PROMPT"
    );
    println!("{}", "-".repeat(80));
    for artifact in artifacts {
        println!(
            "{:<8}  {:<10}  {:<3}  {:<19}  {}",
            artifact.id.short(),
            kind_name(artifact),
            if artifact.favorite { "*" } else { "" },
            artifact.created_at.format("%Y-%m-%d %H:%M:%S"),
            artifact.settings.prompt
        );
    }
}

fn status_name(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Running => "RUNNING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
    }
}

fn kind_name(artifact: &Artifact) -> &'static str {
    match artifact.kind {
        genjob_core::ArtifactKind::Mesh => "mesh",
        genjob_core::ArtifactKind::Material => "material",
        genjob_core::ArtifactKind::Texturing => "texturing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = JsonEvent::new(
            JsonEventType::JobProgress,
            serde_json::json!({ "job_id": "j1", "progress": 0.5 }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"job_progress\""));
        assert!(json.contains("\"progress\":0.5"));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(JobStatus::Completed), "COMPLETED");
        assert_eq!(status_name(JobStatus::Failed), "FAILED");
    }
}
