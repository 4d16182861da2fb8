//! Submission and polling state machine for a single remote task.
//!
//! A [`RemoteTask`] submits its request, obtains a remote task id and polls
//! until the remote reports a terminal status. Transport failures are retried
//! with exponential backoff up to the policy's attempt ceiling; "still
//! processing" poll responses never consume that budget.

mod request;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use genjob_client::{Transport, TransportError};
use genjob_core::{RemoteTaskId, RemoteTaskStatus, TaskPayload};

use crate::config::RetryPolicy;
use crate::observer::Listeners;

pub use request::TaskRequest;

/// Why a remote task ended `Failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("unauthorized: check the API key")]
    Unauthorized,

    #[error("{0}")]
    Fatal(String),

    #[error("all {attempts} submission attempts failed")]
    SubmissionExhausted { attempts: u32 },

    #[error("all {attempts} polling attempts failed")]
    PollingExhausted { attempts: u32 },

    #[error("polling timed out after {0:?}")]
    PollTimeout(Duration),

    #[error("remote reported the task as failed")]
    RemoteFailed,

    #[error("cancelled")]
    Cancelled,
}

/// Outcome of one transport call, classified for the retry loop.
enum Attempt<T> {
    Done(T),
    Retry(String),
}

/// A single request/poll cycle against the remote API.
pub struct RemoteTask {
    request: TaskRequest,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    remote_id: Option<RemoteTaskId>,
    status: RemoteTaskStatus,
    result: Option<TaskPayload>,
    failure: Option<TaskFailure>,
    listeners: Listeners<RemoteTaskStatus>,
    submit_attempts: u32,
    poll_requests: u32,
}

impl RemoteTask {
    pub fn new(request: TaskRequest, transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            request,
            transport,
            policy,
            cancel: CancellationToken::new(),
            remote_id: None,
            status: RemoteTaskStatus::Queued,
            result: None,
            failure: None,
            listeners: Listeners::new(),
            submit_attempts: 0,
            poll_requests: 0,
        }
    }

    /// Builder method to abort the task when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request(&self) -> &TaskRequest {
        &self.request
    }

    pub fn status(&self) -> RemoteTaskStatus {
        self.status
    }

    /// Remote id, set once the first submission is accepted.
    pub fn remote_id(&self) -> Option<&RemoteTaskId> {
        self.remote_id.as_ref()
    }

    /// Final payload of a succeeded task.
    pub fn result(&self) -> Option<&TaskPayload> {
        self.result.as_ref()
    }

    /// Consume the task, returning its final payload.
    pub fn into_result(self) -> Option<TaskPayload> {
        self.result
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    pub fn is_successful(&self) -> bool {
        self.status == RemoteTaskStatus::Succeeded
    }

    /// Number of submission requests made.
    pub fn submit_attempts(&self) -> u32 {
        self.submit_attempts
    }

    /// Number of poll requests made.
    pub fn poll_requests(&self) -> u32 {
        self.poll_requests
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> tokio::sync::mpsc::UnboundedReceiver<RemoteTaskStatus> {
        self.listeners.subscribe()
    }

    /// Drive the task to a terminal status and return it.
    ///
    /// Never fails: every failure is recorded in [`RemoteTask::failure`] and
    /// resolves to `Failed`. Calling it again on a finished task is a no-op.
    pub async fn execute(&mut self) -> RemoteTaskStatus {
        if self.status.is_terminal() {
            return self.status;
        }

        let label = self.request.label();
        match self.run().await {
            Ok(payload) => {
                info!(task = label, remote_id = ?self.remote_id, "Remote task succeeded");
                self.result = Some(payload);
                self.set_status(RemoteTaskStatus::Succeeded);
            }
            Err(failure) => {
                error!(task = label, remote_id = ?self.remote_id, error = %failure, "Remote task failed");
                self.failure = Some(failure);
                self.set_status(RemoteTaskStatus::Failed);
            }
        }
        self.status
    }

    async fn run(&mut self) -> Result<TaskPayload, TaskFailure> {
        let task_id = self.submit_with_retry().await?;
        match self.policy.poll_timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll_until_terminal(&task_id))
                .await
                .unwrap_or(Err(TaskFailure::PollTimeout(limit))),
            None => self.poll_until_terminal(&task_id).await,
        }
    }

    async fn submit_with_retry(&mut self) -> Result<RemoteTaskId, TaskFailure> {
        let label = self.request.label();
        let max_attempts = self.policy.max_attempts.max(1);
        let submission = self.request.submission();

        for attempt in 1..=max_attempts {
            self.submit_attempts += 1;
            let outcome = cancellable(&self.cancel, self.transport.submit(&submission)).await?;

            let reason = match classify(outcome)? {
                Attempt::Done(payload) => match payload.task_id() {
                    Some(id) => {
                        let id = RemoteTaskId::new(id);
                        info!(task = label, remote_id = %id, attempt, "Submission accepted");
                        return Ok(self.remote_id.get_or_insert(id).clone());
                    }
                    None => "empty response: no task id".to_string(),
                },
                Attempt::Retry(reason) => reason,
            };

            warn!(task = label, attempt, error = %reason, "Submission attempt failed");
            if attempt < max_attempts {
                self.wait(self.policy.backoff(attempt)).await?;
            }
        }

        Err(TaskFailure::SubmissionExhausted {
            attempts: max_attempts,
        })
    }

    /// Poll until the remote reports a terminal status.
    ///
    /// Only consecutive transport failures count against the attempt
    /// ceiling; a successful poll resets the count.
    async fn poll_until_terminal(
        &mut self,
        task_id: &RemoteTaskId,
    ) -> Result<TaskPayload, TaskFailure> {
        let label = self.request.label();
        let endpoint = self.request.endpoint();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = 0u32;

        loop {
            self.poll_requests += 1;
            let outcome = cancellable(&self.cancel, self.transport.poll(endpoint, task_id)).await?;

            match classify(outcome)? {
                Attempt::Done(payload) => {
                    failures = 0;
                    debug!(task = label, remote_id = %task_id, status = ?payload.status, "Poll response");

                    match payload.status {
                        RemoteTaskStatus::Queued | RemoteTaskStatus::InProgress => {
                            self.set_status(payload.status);
                            self.wait(self.policy.poll_interval).await?;
                        }
                        RemoteTaskStatus::Failed if self.policy.strict_terminal_status => {
                            return Err(TaskFailure::RemoteFailed);
                        }
                        _ => return Ok(payload),
                    }
                }
                Attempt::Retry(reason) => {
                    failures += 1;
                    warn!(task = label, remote_id = %task_id, attempt = failures, error = %reason, "Polling attempt failed");
                    if failures >= max_attempts {
                        return Err(TaskFailure::PollingExhausted { attempts: failures });
                    }
                    self.wait(self.policy.backoff(failures)).await?;
                }
            }
        }
    }

    async fn wait(&self, delay: Duration) -> Result<(), TaskFailure> {
        cancellable(&self.cancel, tokio::time::sleep(delay)).await
    }

    fn set_status(&mut self, status: RemoteTaskStatus) {
        if self.status != status {
            debug!(task = self.request.label(), from = ?self.status, to = ?status, "Remote task status changed");
            self.status = status;
            self.listeners.notify(status);
        }
    }
}

impl std::fmt::Debug for RemoteTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTask")
            .field("request", &self.request.label())
            .field("remote_id", &self.remote_id)
            .field("status", &self.status)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Split a transport outcome into success, retryable failure or fatal failure.
fn classify<T>(outcome: Result<T, TransportError>) -> Result<Attempt<T>, TaskFailure> {
    match outcome {
        Ok(value) => Ok(Attempt::Done(value)),
        Err(e) if e.is_unauthorized() => Err(TaskFailure::Unauthorized),
        Err(e) if e.is_retryable() => Ok(Attempt::Retry(e.to_string())),
        Err(e) => Err(TaskFailure::Fatal(e.to_string())),
    }
}

async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output, TaskFailure> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(TaskFailure::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{http_error, payload, ScriptedTransport};
    use genjob_core::GenerationSettings;

    fn preview() -> TaskRequest {
        TaskRequest::MaterialPreview {
            settings: GenerationSettings::new("rusty metal"),
        }
    }

    fn task(transport: &Arc<ScriptedTransport>) -> RemoteTask {
        RemoteTask::new(preview(), transport.clone(), RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_poll_to_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        transport.push_poll(Ok(payload("m1", "queued")));
        transport.push_poll(Ok(payload("m1", "in_progress")));
        transport.push_poll(Ok(payload("m1", "succeeded")));

        let mut task = task(&transport);
        let mut statuses = task.subscribe();

        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(task.remote_id().map(|id| id.as_str()), Some("m1"));
        assert_eq!(task.poll_requests(), 3);
        assert!(task.result().is_some());

        let mut seen = Vec::new();
        while let Ok(status) = statuses.try_recv() {
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![RemoteTaskStatus::InProgress, RemoteTaskStatus::Succeeded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_task_id_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("", "queued")));
        transport.push_submit(Ok(payload("m2", "queued")));
        transport.push_poll(Ok(payload("m2", "succeeded")));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(task.submit_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_submission_response_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(TransportError::Empty));
        transport.push_submit(Ok(payload("m3", "queued")));
        transport.push_poll(Ok(payload("m3", "succeeded")));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(task.submit_attempts(), 2);
        assert_eq!(task.remote_id().map(|id| id.as_str()), Some("m3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_poll_response_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        transport.push_poll(Err(TransportError::Empty));
        transport.push_poll(Ok(payload("m1", "succeeded")));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(task.poll_requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(TransportError::Decode("bad json".into())));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.submit_attempts(), 1);
        assert!(matches!(task.failure(), Some(TaskFailure::Fatal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unauthorized_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        transport.push_poll(Err(http_error(500)));
        transport.push_poll(Err(http_error(401)));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.failure(), Some(&TaskFailure::Unauthorized));
        assert_eq!(task.poll_requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_reset_after_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        for _ in 0..9 {
            transport.push_poll(Err(http_error(503)));
        }
        transport.push_poll(Ok(payload("m1", "in_progress")));
        for _ in 0..9 {
            transport.push_poll(Err(http_error(503)));
        }
        transport.push_poll(Ok(payload("m1", "succeeded")));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(task.poll_requests(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhaustion() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        for _ in 0..10 {
            transport.push_poll(Err(http_error(502)));
        }

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(
            task.failure(),
            Some(&TaskFailure::PollingExhausted { attempts: 10 })
        );
        assert_eq!(task.poll_requests(), 10);
        assert_eq!(task.submit_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failed_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        transport.push_poll(Ok(payload("m1", "failed")));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.failure(), Some(&TaskFailure::RemoteFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_mode_accepts_remote_failed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Ok(payload("m1", "queued")));
        transport.push_poll(Ok(payload("m1", "failed")));

        let policy = RetryPolicy::default().with_legacy_terminal_status();
        let mut task = RemoteTask::new(preview(), transport.clone(), policy);
        assert_eq!(task.execute().await, RemoteTaskStatus::Succeeded);
        assert_eq!(
            task.result().map(|p| p.status),
            Some(RemoteTaskStatus::Failed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout() {
        let transport = Arc::new(ScriptedTransport::new().with_default_poll("in_progress"));
        transport.push_submit(Ok(payload("m1", "queued")));

        let policy = RetryPolicy::default().with_poll_timeout(Duration::from_secs(30));
        let mut task = RemoteTask::new(preview(), transport.clone(), policy);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(
            task.failure(),
            Some(&TaskFailure::PollTimeout(Duration::from_secs(30)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_backoff() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..10 {
            transport.push_submit(Err(http_error(500)));
        }

        let token = CancellationToken::new();
        let mut task = task(&transport).with_cancellation(token.clone());
        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            token.cancel();
        });

        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.failure(), Some(&TaskFailure::Cancelled));
        assert_eq!(task.submit_attempts(), 2);
        cancel.await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_is_idempotent_once_terminal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_submit(Err(http_error(401)));

        let mut task = task(&transport);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.execute().await, RemoteTaskStatus::Failed);
        assert_eq!(task.submit_attempts(), 1);
    }
}
