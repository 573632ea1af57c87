//! Shared helpers for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_comfyui::stub::{StubComfyUI, StubConfig, StubOutput};
use relay_core::job::JobRequest;
use relay_core::state::ServiceState;
use relay_pipeline::config::PipelineConfig;
use relay_pipeline::runner::GenerationPipeline;

/// A tiny valid PNG (1x1, transparent).
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Directory holding the shipped workflow templates.
pub fn workflow_dir() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../workflows").to_string()
}

/// Timings shrunk so failure scenarios finish in well under a second.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        ready_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(20),
        job_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Stub config serving `u.png`, `u2.png` and `r.png` and producing one image.
pub fn stub_config() -> StubConfig {
    let sources: HashMap<String, Vec<u8>> = ["u.png", "u2.png", "r.png"]
        .into_iter()
        .map(|name| (name.to_string(), format!("source:{name}").into_bytes()))
        .collect();
    StubConfig {
        sources,
        outputs: vec![StubOutput::new("portrait_00001_.png", PNG_1X1)],
        ..Default::default()
    }
}

pub fn pipeline_for(stub: &StubComfyUI) -> GenerationPipeline {
    GenerationPipeline::connect(
        &stub.base_url(),
        workflow_dir(),
        Arc::new(ServiceState::new()),
        fast_config(),
    )
}

pub fn single_request(stub: &StubComfyUI) -> JobRequest {
    JobRequest {
        job_id: Some("j1".into()),
        style_id: Some("single".into()),
        user_image1_url: Some(stub.source_url("u.png")),
        reference_image_url: Some(stub.source_url("r.png")),
        prompt: Some("a cat".into()),
        ..Default::default()
    }
}
