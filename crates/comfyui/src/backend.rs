//! The seam between the relay and a ComfyUI server.
//!
//! [`ComfyUIApi`](crate::api::ComfyUIApi) is the production
//! implementation; tests substitute scripted in-memory backends.

use async_trait::async_trait;

use crate::api::{ComfyUIApiError, SubmitResponse};
use crate::history::{HistoryEntry, ImageRef};

/// Operations the relay needs from the downstream generation server.
#[async_trait]
pub trait ComfyBackend: Send + Sync {
    /// Lightweight status request; `Ok` means the server is ready.
    async fn system_stats(&self) -> Result<(), ComfyUIApiError>;

    /// Register `bytes` as an input image under `name`; returns the
    /// name the server actually assigned.
    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String, ComfyUIApiError>;

    /// Queue a concrete workflow for execution.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError>;

    /// Execution record for `prompt_id`, `None` while none exists.
    async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError>;

    /// Raw bytes of a produced image.
    async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError>;
}
