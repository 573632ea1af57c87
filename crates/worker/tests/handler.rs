//! Invocation handler scenarios against the in-process ComfyUI stub.

mod common;

use base64::{engine::general_purpose, Engine as _};
use relay_comfyui::stub::{HistoryBehavior, StubComfyUI, StubConfig};
use relay_worker::handler::handle;
use serde_json::json;

use common::{event, pipeline_for, stub_config, OUTPUT_IMAGE};

#[tokio::test]
async fn single_job_completes_with_the_image() {
    let stub = StubComfyUI::start(stub_config()).await;
    let pipeline = pipeline_for(&stub);

    let response = handle(
        &pipeline,
        event(json!({
            "jobId": "j1",
            "styleId": "single",
            "userImage1Url": stub.source_url("u.png"),
            "referenceImageUrl": stub.source_url("r.png"),
            "prompt": "a cat",
        })),
    )
    .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "status": "completed",
            "jobId": "j1",
            "images": [general_purpose::STANDARD.encode(OUTPUT_IMAGE)],
            "message": "Generated 1 images successfully",
        })
    );
}

#[tokio::test]
async fn never_completing_job_fails_with_the_timeout_message() {
    let stub = StubComfyUI::start(StubConfig {
        history: HistoryBehavior::Running,
        ..stub_config()
    })
    .await;
    let pipeline = pipeline_for(&stub);

    let response = handle(
        &pipeline,
        event(json!({
            "jobId": "j1",
            "styleId": "single",
            "userImage1Url": stub.source_url("u.png"),
            "referenceImageUrl": stub.source_url("r.png"),
            "prompt": "a cat",
        })),
    )
    .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "status": "failed",
            "jobId": "j1",
            "error": "Workflow timed out after 1 seconds",
        })
    );
}

#[tokio::test]
async fn couples_job_without_second_image_fails_without_calls() {
    let stub = StubComfyUI::start(stub_config()).await;
    let pipeline = pipeline_for(&stub);

    let response = handle(
        &pipeline,
        event(json!({
            "jobId": "j2",
            "styleId": "couples",
            "userImage1Url": stub.source_url("u.png"),
            "referenceImageUrl": stub.source_url("r.png"),
            "prompt": "two cats",
        })),
    )
    .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "status": "failed", "error": "Missing userImage2Url for couples style" })
    );
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn missing_required_fields_are_listed() {
    let stub = StubComfyUI::start(stub_config()).await;
    let pipeline = pipeline_for(&stub);

    let response = handle(&pipeline, event(json!({ "prompt": "a cat" }))).await;

    assert_eq!(
        response.error.as_deref(),
        Some("Missing required fields: jobId, userImage1Url, referenceImageUrl")
    );
    assert_eq!(response.job_id, None);
    assert_eq!(stub.request_count(), 0);
}

#[tokio::test]
async fn downstream_failure_keeps_the_job_id() {
    let stub = StubComfyUI::start(StubConfig {
        history: HistoryBehavior::Failed("execution_error".into()),
        ..stub_config()
    })
    .await;
    let pipeline = pipeline_for(&stub);

    let response = handle(
        &pipeline,
        event(json!({
            "jobId": "j3",
            "userImage1Url": stub.source_url("u.png"),
            "referenceImageUrl": stub.source_url("r.png"),
        })),
    )
    .await;

    assert_eq!(response.job_id.as_deref(), Some("j3"));
    assert_eq!(
        response.error.as_deref(),
        Some("ComfyUI workflow failed: execution_error")
    );
    assert!(response.images.is_none());
}

#[tokio::test]
async fn unknown_style_keeps_the_job_id_without_calls() {
    let stub = StubComfyUI::start(stub_config()).await;
    let pipeline = pipeline_for(&stub);

    let response = handle(
        &pipeline,
        event(json!({
            "jobId": "j4",
            "styleId": "triples",
            "userImage1Url": stub.source_url("u.png"),
            "referenceImageUrl": stub.source_url("r.png"),
        })),
    )
    .await;

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "status": "failed", "jobId": "j4", "error": "Unknown styleId: triples" })
    );
    assert_eq!(stub.request_count(), 0);
}
