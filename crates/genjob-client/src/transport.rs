//! The request boundary between the job runner and the remote API.

use async_trait::async_trait;
use serde_json::Value;

use genjob_core::{RemoteTaskId, TaskPayload};

use crate::error::TransportError;

/// One part of a multipart form upload.
#[derive(Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        data: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn png(name: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: "image/png".to_string(),
            data,
        }
    }

    /// Form field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

impl std::fmt::Debug for FormPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { name, value } => f
                .debug_struct("Text")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::File {
                name,
                file_name,
                mime,
                data,
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("file_name", file_name)
                .field("mime", mime)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// Body of a submission request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionBody {
    Empty,
    Json(Value),
    Form(Vec<FormPart>),
}

/// A POST that starts remote work.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Path relative to the API base url, e.g. `text-to-3d`.
    pub path: String,
    pub body: SubmissionBody,
}

impl Submission {
    pub fn new(path: impl Into<String>, body: SubmissionBody) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }

    /// Text value of a JSON field or form field, for inspection in logs and tests.
    pub fn field(&self, name: &str) -> Option<String> {
        match &self.body {
            SubmissionBody::Empty => None,
            SubmissionBody::Json(value) => value.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            SubmissionBody::Form(parts) => parts.iter().find_map(|part| match part {
                FormPart::Text { name: n, value } if n == name => Some(value.clone()),
                FormPart::File {
                    name: n, file_name, ..
                } if n == name => Some(file_name.clone()),
                _ => None,
            }),
        }
    }
}

/// Authenticated operations against the remote API.
///
/// Implementations must not retry; retry policy lives with the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start remote work. The returned payload carries the new task id.
    async fn submit(&self, submission: &Submission) -> Result<TaskPayload, TransportError>;

    /// Query a task's status at `{endpoint}/{task_id}`.
    async fn poll(&self, endpoint: &str, task_id: &RemoteTaskId)
        -> Result<TaskPayload, TransportError>;

    /// Fetch a result file.
    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_field_lookup() {
        let submission = Submission::new(
            "text-to-3d",
            SubmissionBody::Json(json!({"prompt": "a red chair", "seed": 42})),
        );
        assert_eq!(submission.field("prompt").as_deref(), Some("a red chair"));
        assert_eq!(submission.field("seed").as_deref(), Some("42"));
        assert_eq!(submission.field("negativePrompt"), None);
    }

    #[test]
    fn test_form_field_lookup() {
        let submission = Submission::new(
            "image-to-3d",
            SubmissionBody::Form(vec![
                FormPart::text("prompt", "statue"),
                FormPart::png("image", "ref.png", vec![0; 4]),
            ]),
        );
        assert_eq!(submission.field("prompt").as_deref(), Some("statue"));
        assert_eq!(submission.field("image").as_deref(), Some("ref.png"));
    }

    #[test]
    fn test_form_part_debug_hides_bytes() {
        let part = FormPart::png("image", "ref.png", vec![7; 1024]);
        let debug = format!("{:?}", part);
        assert!(debug.contains("len: 1024"));
    }
}
