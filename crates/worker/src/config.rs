use std::path::PathBuf;
use std::time::Duration;

use relay_core::config::{env_string, ConfigError};
use relay_pipeline::config::PipelineConfig;

/// Pre-flight readiness wait for an invocation.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the ComfyUI server (default: `http://127.0.0.1:8188`).
    pub comfyui_url: String,
    /// Directory holding `workflow_single.json` and `workflow_couples.json`
    /// (default: `/`).
    pub workflow_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                  |
    /// |----------------------|--------------------------|
    /// | `COMFYUI_URL`        | `http://127.0.0.1:8188`  |
    /// | `WORKFLOW_DIR`       | `/`                      |
    /// | `READY_TIMEOUT_SECS` | `30`                     |
    /// | `JOB_TIMEOUT_SECS`   | `900`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            comfyui_url: env_string("COMFYUI_URL", "http://127.0.0.1:8188"),
            workflow_dir: PathBuf::from(env_string("WORKFLOW_DIR", "/")),
            pipeline: PipelineConfig::from_env(DEFAULT_READY_TIMEOUT)?,
        })
    }
}
