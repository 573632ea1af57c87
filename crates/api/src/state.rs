use std::sync::Arc;

use relay_comfyui::process::ComfyUIProcess;
use relay_core::state::ServiceState;
use relay_pipeline::pool::WorkerPool;
use relay_pipeline::runner::GenerationPipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<GenerationPipeline>,
    /// Readiness flag and request counter, shared with the pipeline.
    pub service: Arc<ServiceState>,
    /// Runs generation jobs off the request path.
    pub pool: WorkerPool,
    /// The ComfyUI process, when this service launched it.
    pub comfyui: Option<Arc<ComfyUIProcess>>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        pipeline: Arc<GenerationPipeline>,
        comfyui: Option<Arc<ComfyUIProcess>>,
    ) -> Self {
        let service = Arc::clone(pipeline.state());
        let pool = WorkerPool::new(config.worker_pool_size);
        Self {
            config: Arc::new(config),
            pipeline,
            service,
            pool,
            comfyui,
        }
    }

    /// `running` / `stopped` for a launched ComfyUI, `external` otherwise.
    pub fn comfyui_status(&self) -> &'static str {
        match &self.comfyui {
            Some(process) if process.is_running() => "running",
            Some(_) => "stopped",
            None => "external",
        }
    }
}
