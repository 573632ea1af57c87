//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (status probe, image upload, workflow
//! submission, history retrieval, artifact download) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::ComfyBackend;
use crate::history::{parse_history, HistoryEntry, ImageRef};

/// `Accept` header sent for every image download so CDNs and ComfyUI
/// hand back the original PNG instead of a transcoded variant.
pub const IMAGE_ACCEPT: &str = "image/png,image/*;q=0.8,*/*;q=0.5";

/// Per-endpoint request timeouts.
#[derive(Debug, Clone)]
pub struct ApiTimeouts {
    /// `GET /system_stats`.
    pub status: Duration,
    /// `POST /upload/image`.
    pub upload: Duration,
    /// `POST /prompt`.
    pub queue: Duration,
    /// `GET /history/{prompt_id}`.
    pub history: Duration,
    /// `GET /view`.
    pub view: Duration,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            status: Duration::from_secs(2),
            upload: Duration::from_secs(30),
            queue: Duration::from_secs(30),
            history: Duration::from_secs(10),
            view: Duration::from_secs(30),
        }
    }
}

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    timeouts: ApiTimeouts,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// Response returned by `/upload/image`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    /// Name ComfyUI stored the file under (may differ from the requested one).
    name: Option<String>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (the same client also downloads the caller's source images).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            timeouts: ApiTimeouts::default(),
        }
    }

    /// Override the per-endpoint timeouts.
    pub fn timeouts(mut self, timeouts: ApiTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Base HTTP URL of the instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    ///
    /// A body that does not deserialize is reported as
    /// [`ComfyUIApiError::MalformedResponse`] carrying the raw text.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ComfyUIApiError::MalformedResponse(format!("{e}: {body}")))
    }
}

#[async_trait]
impl ComfyBackend for ComfyUIApi {
    /// `GET /system_stats` -- succeeds once the server is accepting work.
    async fn system_stats(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(self.timeouts.status)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    /// `POST /upload/image` as an `input` asset with overwrite allowed.
    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String, ComfyUIApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", "input")
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .timeout(self.timeouts.upload)
            .send()
            .await?;

        let uploaded: UploadResponse = Self::parse_response(response).await?;
        Ok(uploaded.name.unwrap_or_else(|| name.to_string()))
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID.  Returns the server-assigned `prompt_id` and queue
    /// position.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .timeout(self.timeouts.queue)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the execution record for a specific prompt.
    ///
    /// Returns `Ok(None)` while ComfyUI has no history for the prompt yet.
    async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(self.timeouts.history)
            .send()
            .await?;

        let body = Self::ensure_success(response).await?.text().await?;
        parse_history(&body, prompt_id)
            .map_err(|e| ComfyUIApiError::MalformedResponse(format!("{e}: {body}")))
    }

    /// `GET /view` -- raw bytes of a produced image, untouched.
    async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .header(reqwest::header::ACCEPT, IMAGE_ACCEPT)
            .timeout(self.timeouts.view)
            .send()
            .await?;

        let bytes = Self::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
