//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use relay_api::config::ServerConfig;
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_api::stream::GenerateResponse;
use relay_comfyui::stub::{StubComfyUI, StubConfig, StubOutput};
use relay_core::state::ServiceState;
use relay_pipeline::config::PipelineConfig;
use relay_pipeline::runner::GenerationPipeline;
use tower::ServiceExt;

/// Bytes of the one image the default stub produces.
pub const OUTPUT_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nsse-image-body";

/// Build a test `ServerConfig` pointing at `comfyui_url`, with timings
/// shrunk so whole jobs finish in well under a second.
pub fn test_config(comfyui_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        health_port: 0,
        request_timeout_secs: 30,
        comfyui_url: comfyui_url.to_string(),
        comfyui_main: None,
        workflow_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../workflows")),
        startup_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_millis(50),
        worker_pool_size: 4,
        pipeline: PipelineConfig {
            ready_timeout: Duration::from_millis(500),
            probe_interval: Duration::from_millis(20),
            job_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
    }
}

/// Build the full application router (same middleware stack as
/// production) against a ComfyUI at `comfyui_url`.
pub fn build_test_app(comfyui_url: &str) -> (Router, AppState) {
    let config = test_config(comfyui_url);
    let pipeline = Arc::new(GenerationPipeline::connect(
        &config.comfyui_url,
        config.workflow_dir.clone(),
        Arc::new(ServiceState::new()),
        config.pipeline.clone(),
    ));
    let state = AppState::new(config, pipeline, None);
    (build_app_router(state.clone()), state)
}

/// A ComfyUI URL nothing listens on.
pub const UNREACHABLE_COMFYUI: &str = "http://127.0.0.1:9";

pub fn stub_config() -> StubConfig {
    let sources: HashMap<String, Vec<u8>> = ["u.png", "u2.png", "r.png"]
        .into_iter()
        .map(|name| (name.to_string(), name.as_bytes().to_vec()))
        .collect();
    StubConfig {
        sources,
        outputs: vec![StubOutput::new("portrait_00001_.png", OUTPUT_IMAGE)],
        ..Default::default()
    }
}

pub fn single_job(stub: &StubComfyUI) -> serde_json::Value {
    serde_json::json!({
        "jobId": "j1",
        "styleId": "single",
        "userImage1Url": stub.source_url("u.png"),
        "referenceImageUrl": stub.source_url("r.png"),
        "prompt": "a cat",
    })
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: &serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Read the whole body; for an event stream this waits for its end.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// The payload of the stream's single `data:` event.
pub fn final_event(stream: &str) -> GenerateResponse {
    let data: Vec<_> = stream
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert_eq!(data.len(), 1, "expected exactly one data event in {stream:?}");
    serde_json::from_str(data[0]).unwrap()
}

/// Number of keep-alive comments in the stream.
pub fn keep_alives(stream: &str) -> usize {
    stream.lines().filter(|line| *line == ": keep-alive").count()
}
