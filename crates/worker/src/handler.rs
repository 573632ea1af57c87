//! Maps one invocation event to one terminal response.
//!
//! Failures never escape: every error becomes a `failed` response.

use relay_core::job::JobRequest;
use relay_pipeline::runner::GenerationPipeline;
use serde::{Deserialize, Serialize};

/// The envelope the hosting runtime delivers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub input: JobRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Base64 images, in output order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InvocationResponse {
    pub fn completed(job_id: String, images: Vec<String>) -> Self {
        let message = format!("Generated {} images successfully", images.len());
        Self {
            status: InvocationStatus::Completed,
            job_id: Some(job_id),
            images: Some(images),
            error: None,
            message: Some(message),
        }
    }

    pub fn failed(job_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Failed,
            job_id,
            images: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

/// Run the job in `event` and describe its outcome.
///
/// Requests missing required fields carry no `jobId`; every other
/// failure carries the caller's id, or `"unknown"` if it had none.
pub async fn handle(pipeline: &GenerationPipeline, event: InvocationEvent) -> InvocationResponse {
    let request = event.input;
    let started = std::time::Instant::now();

    match pipeline.run(&request).await {
        Ok(output) => {
            let images = output.result.encoded_images();
            tracing::info!(
                job_id = %output.job_id,
                images = images.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job completed",
            );
            InvocationResponse::completed(output.job_id, images)
        }
        Err(err) if err.is_rejected_request() => {
            tracing::warn!(error = %err, "Rejected invocation");
            InvocationResponse::failed(None, err.to_string())
        }
        Err(err) => {
            let job_id = request.job_id_or_unknown().to_string();
            tracing::error!(
                job_id = %job_id,
                error = %err,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job failed",
            );
            InvocationResponse::failed(Some(job_id), err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn completed_response_shape() {
        let response = InvocationResponse::completed("j1".into(), vec!["AAEC".into()]);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "completed",
                "jobId": "j1",
                "images": ["AAEC"],
                "message": "Generated 1 images successfully",
            })
        );
    }

    #[test]
    fn failed_response_without_job_id_omits_the_key() {
        let response = InvocationResponse::failed(None, "Missing userImage2Url for couples style");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "failed", "error": "Missing userImage2Url for couples style" })
        );
    }

    #[test]
    fn event_without_input_is_an_empty_request() {
        let event: InvocationEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event.input, JobRequest::default());
    }

    #[test]
    fn event_input_uses_camel_case_fields() {
        let event: InvocationEvent = serde_json::from_value(json!({
            "input": {
                "jobId": "j1",
                "styleId": "couples",
                "userImage1Url": "https://x/u.png",
                "userImage2Url": "https://x/u2.png",
                "referenceImageUrl": "https://x/r.png",
                "prompt": "two cats",
            }
        }))
        .unwrap();
        assert_eq!(event.input.job_id.as_deref(), Some("j1"));
        assert_eq!(event.input.user_image2_url.as_deref(), Some("https://x/u2.png"));
    }
}
