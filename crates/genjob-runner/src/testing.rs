//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use genjob_client::{Submission, Transport, TransportError};
use genjob_core::{RemoteTaskId, RemoteTaskStatus, TaskPayload, TaskUrls};

pub fn payload(id: &str, status: &str) -> TaskPayload {
    TaskPayload {
        id: id.to_string(),
        status: RemoteTaskStatus::from_remote(status),
        ..TaskPayload::default()
    }
}

pub fn succeeded(id: &str, urls: TaskUrls) -> TaskPayload {
    TaskPayload {
        urls,
        ..payload(id, "succeeded")
    }
}

pub fn http_error(status: u16) -> TransportError {
    TransportError::Http {
        status,
        message: format!("status {}", status),
        body: String::new(),
    }
}

/// Replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    submits: Mutex<VecDeque<Result<TaskPayload, TransportError>>>,
    polls: Mutex<VecDeque<Result<TaskPayload, TransportError>>>,
    default_poll: Option<String>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    pub submissions: Mutex<Vec<Submission>>,
    pub polled: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer polls with this status once the poll script runs out.
    pub fn with_default_poll(mut self, status: &str) -> Self {
        self.default_poll = Some(status.to_string());
        self
    }

    pub fn push_submit(&self, result: Result<TaskPayload, TransportError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn push_poll(&self, result: Result<TaskPayload, TransportError>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn serve(&self, url: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), data);
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn poll_count(&self) -> usize {
        self.polled.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(&self, submission: &Submission) -> Result<TaskPayload, TransportError> {
        self.submissions.lock().unwrap().push(submission.clone());
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("submit script exhausted".into())))
    }

    async fn poll(
        &self,
        endpoint: &str,
        task_id: &RemoteTaskId,
    ) -> Result<TaskPayload, TransportError> {
        self.polled
            .lock()
            .unwrap()
            .push(format!("{}/{}", endpoint, task_id));
        let next = self.polls.lock().unwrap().pop_front();
        match (next, &self.default_poll) {
            (Some(result), _) => result,
            (None, Some(status)) => Ok(payload(task_id.as_str(), status)),
            (None, None) => Err(TransportError::Network("poll script exhausted".into())),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.downloads.lock().unwrap().push(url.to_string());
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| http_error(404))
    }
}
