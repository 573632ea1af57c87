//! Shared helpers for worker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_comfyui::stub::{StubComfyUI, StubConfig, StubOutput};
use relay_core::state::ServiceState;
use relay_pipeline::config::PipelineConfig;
use relay_pipeline::runner::GenerationPipeline;
use relay_worker::handler::InvocationEvent;
use serde_json::json;

/// Bytes of the one image the default stub produces.
pub const OUTPUT_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-body";

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

pub fn pipeline_for(stub: &StubComfyUI) -> GenerationPipeline {
    let config = PipelineConfig {
        ready_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(20),
        job_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    };
    GenerationPipeline::connect(
        &stub.base_url(),
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../workflows"),
        Arc::new(ServiceState::new()),
        config,
    )
}

/// An event in the shape the hosting runtime sends.
pub fn event(input: serde_json::Value) -> InvocationEvent {
    serde_json::from_value(json!({ "input": input })).expect("valid invocation event")
}
