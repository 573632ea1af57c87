//! Asset staging: download a caller's source image and register it with
//! ComfyUI as a named input asset.
//!
//! Each staged file gets a fresh `<uuid>_<role>.png` name so concurrent
//! jobs sharing one ComfyUI instance never overwrite each other's inputs.
//! Staged assets are never cleaned up; their lifetime belongs to ComfyUI.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_comfyui::api::{ComfyUIApiError, IMAGE_ACCEPT};
use relay_comfyui::backend::ComfyBackend;

/// The part a staged image plays in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    /// The style/reference image.
    Reference,
    /// The first (or only) subject photo.
    Subject1,
    /// The second subject photo of a couples job.
    Subject2,
}

impl AssetRole {
    /// Suffix of the uploaded file name.
    pub fn file_name(&self) -> &'static str {
        match self {
            AssetRole::Reference => "reference.png",
            AssetRole::Subject1 => "user1.png",
            AssetRole::Subject2 => "user2.png",
        }
    }
}

/// Why a source image could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),
}

/// Where source images come from.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Downloads source images over HTTP(S).
pub struct HttpImageSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpImageSource {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, IMAGE_ACCEPT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Failed to download image from {url}")]
    DownloadFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Carries the ComfyUI response body, or the transport error when
    /// no response arrived.
    #[error("Failed to upload image to ComfyUI: {0}")]
    UploadFailed(String),
}

impl From<ComfyUIApiError> for StageError {
    fn from(err: ComfyUIApiError) -> Self {
        match err {
            ComfyUIApiError::ApiError { body, .. } => StageError::UploadFailed(body),
            other => StageError::UploadFailed(other.to_string()),
        }
    }
}

/// Moves source images from their URLs into ComfyUI's input folder.
pub struct AssetStager {
    source: Arc<dyn ImageSource>,
    backend: Arc<dyn ComfyBackend>,
}

impl AssetStager {
    pub fn new(source: Arc<dyn ImageSource>, backend: Arc<dyn ComfyBackend>) -> Self {
        Self { source, backend }
    }

    /// Download `url` and upload it for `role`. Returns the name ComfyUI
    /// assigned, which is what the workflow must reference.
    ///
    /// Single attempt; any failure is terminal for the job.
    pub async fn stage(&self, url: &str, role: AssetRole) -> Result<String, StageError> {
        let bytes = self.source.fetch(url).await.map_err(|source| {
            tracing::warn!(url, error = %source, "Source image download failed");
            StageError::DownloadFailed {
                url: url.to_string(),
                source,
            }
        })?;

        let requested = unique_name(role);
        let size = bytes.len();
        let assigned = self.backend.upload_image(&requested, bytes).await?;

        tracing::debug!(
            role = role.file_name(),
            asset_name = %assigned,
            size,
            "Staged input image",
        );
        Ok(assigned)
    }
}

fn unique_name(role: AssetRole) -> String {
    format!("{}_{}", uuid::Uuid::new_v4(), role.file_name())
}
