//! HTTP client for the remote generation API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use genjob_core::{BillingInfo, RemoteTaskId, TaskPayload};

use crate::config::ApiConfig;
use crate::error::{ClientError, TransportError};
use crate::transport::{FormPart, Submission, SubmissionBody, Transport};

/// Authenticated client for the remote API.
#[derive(Clone)]
pub struct ApiClient {
    inner: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Create a new client from a validated config.
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { inner, config })
    }

    /// The config this client was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetch the account's credit balance.
    pub async fn billing(&self) -> Result<BillingInfo, TransportError> {
        self.get_json("billing").await
    }

    /// GET an endpoint and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, TransportError> {
        decode_json(self.get(endpoint).await?).await
    }

    async fn get(&self, endpoint: &str) -> Result<Response, TransportError> {
        let url = self.config.url(endpoint);
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        check_status(response).await
    }

    async fn post(&self, submission: &Submission) -> Result<Response, TransportError> {
        let url = self.config.url(&submission.path);
        debug!(url = %url, "POST request");

        let request = self
            .inner
            .post(&url)
            .bearer_auth(&self.config.api_key);

        let request = match &submission.body {
            SubmissionBody::Empty => request,
            SubmissionBody::Json(value) => request.json(value),
            SubmissionBody::Form(parts) => request.multipart(build_form(parts)?),
        };

        check_status(request.send().await?).await
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn submit(&self, submission: &Submission) -> Result<TaskPayload, TransportError> {
        let response = self.post(submission).await?;
        parse_payload(&response.text().await?)
    }

    async fn poll(
        &self,
        endpoint: &str,
        task_id: &RemoteTaskId,
    ) -> Result<TaskPayload, TransportError> {
        let response = self.get(&format!("{}/{}", endpoint, task_id)).await?;
        parse_payload(&response.text().await?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!(url = %url, "Downloading file");

        let response = self
            .inner
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                data,
            } => {
                let file = Part::bytes(data.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                form.part(name.clone(), file)
            }
        };
    }
    Ok(form)
}

/// Turn a non-success response into [`TransportError::Http`], keeping the body.
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string();
    let body = response.text().await.unwrap_or_default();

    error!(status = status.as_u16(), message = %message, body = %body, "HTTP request failed");

    Err(TransportError::Http {
        status: status.as_u16(),
        message,
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Decode a task payload, treating an empty or `null` body as [`TransportError::Empty`].
fn parse_payload(text: &str) -> Result<TaskPayload, TransportError> {
    if text.trim().is_empty() {
        return Err(TransportError::Empty);
    }
    serde_json::from_str::<Option<TaskPayload>>(text)
        .map_err(|e| TransportError::Decode(e.to_string()))?
        .ok_or(TransportError::Empty)
}
