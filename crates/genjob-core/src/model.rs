//! Wire model of the remote generation API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::status::RemoteTaskStatus;

/// Stage a remote task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTaskKind {
    Preview,
    Optimize,
}

/// Result files of a remote task. Every url is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUrls {
    #[serde(default)]
    pub glb: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub albedo: Option<String>,
    #[serde(default, rename = "normal")]
    pub normals: Option<String>,
    #[serde(default)]
    pub displacement: Option<String>,
    #[serde(default, rename = "metalness")]
    pub metallic: Option<String>,
    #[serde(default)]
    pub roughness: Option<String>,
    #[serde(default, rename = "metallicRoughness")]
    pub metallic_roughness: Option<String>,
    #[serde(default, rename = "ao")]
    pub ambient_occlusion: Option<String>,
}

impl TaskUrls {
    /// True if no url is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The remote sends `[]` instead of `{}` when a task has no results yet.
fn urls_or_empty<'de, D>(deserializer: D) -> Result<TaskUrls, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => {
            serde_json::from_value(Value::Object(map)).map_err(serde::de::Error::custom)
        }
        _ => Ok(TaskUrls::default()),
    }
}

/// A task as reported by the remote, both on submission and on polling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    /// Remote task id. Empty when the remote did not assign one.
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub kind: Option<RemoteTaskKind>,

    #[serde(default)]
    pub status: RemoteTaskStatus,

    #[serde(default)]
    pub seed: i64,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub negative_prompt: Option<String>,

    #[serde(default, deserialize_with = "urls_or_empty")]
    pub urls: TaskUrls,

    /// Texturing tasks report their results here instead of `urls`.
    #[serde(default, deserialize_with = "urls_or_empty")]
    pub outputs: TaskUrls,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub credits_used: i64,
}

impl TaskPayload {
    /// Returns the remote id if one was assigned.
    pub fn task_id(&self) -> Option<&str> {
        let id = self.id.trim();
        (!id.is_empty()).then_some(id)
    }

    /// Result urls, preferring `urls` and falling back to `outputs`.
    pub fn result_urls(&self) -> &TaskUrls {
        if self.urls.is_empty() {
            &self.outputs
        } else {
            &self.urls
        }
    }
}

/// Account credit balance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    #[serde(default)]
    pub subscription: String,

    /// Remaining credits.
    #[serde(default, rename = "remaining")]
    pub credits: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_with_urls() {
        let json = r#"{
            "id": "t1",
            "kind": "optimize",
            "status": "succeeded",
            "seed": 42,
            "prompt": "a red chair",
            "urls": {"glb": "https://cdn/mesh.glb", "normal": "https://cdn/n.png"},
            "createdAt": "2024-05-01T10:00:00Z",
            "creditsUsed": 20
        }"#;
        let payload: TaskPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.task_id(), Some("t1"));
        assert_eq!(payload.kind, Some(RemoteTaskKind::Optimize));
        assert_eq!(payload.status, RemoteTaskStatus::Succeeded);
        assert_eq!(payload.urls.glb.as_deref(), Some("https://cdn/mesh.glb"));
        assert_eq!(payload.urls.normals.as_deref(), Some("https://cdn/n.png"));
        assert_eq!(payload.credits_used, 20);
    }

    #[test]
    fn test_payload_empty_array_urls() {
        let json = r#"{"id": "t2", "status": "in_progress", "urls": []}"#;
        let payload: TaskPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.status, RemoteTaskStatus::InProgress);
        assert!(payload.urls.is_empty());
    }

    #[test]
    fn test_payload_without_id() {
        let payload: TaskPayload = serde_json::from_str(r#"{"status": "queued"}"#).unwrap();
        assert_eq!(payload.task_id(), None);
    }

    #[test]
    fn test_texturing_outputs_fallback() {
        let json = r#"{"id": "t3", "status": "succeeded", "urls": [], "outputs": {"albedo": "https://cdn/a.png"}}"#;
        let payload: TaskPayload = serde_json::from_str(json).unwrap();
        assert_eq!(
            payload.result_urls().albedo.as_deref(),
            Some("https://cdn/a.png")
        );
    }

    #[test]
    fn test_billing_decode() {
        let billing: BillingInfo =
            serde_json::from_str(r#"{"subscription": "pro", "remaining": 1200}"#).unwrap();
        assert_eq!(billing.credits, 1200);
    }
}
