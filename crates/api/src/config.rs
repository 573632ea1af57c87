use std::path::PathBuf;
use std::time::Duration;

use relay_core::config::{env_or, env_secs, env_string, ConfigError};
use relay_pipeline::config::PipelineConfig;
use relay_pipeline::pool::DEFAULT_POOL_SIZE;

/// Port ComfyUI listens on when its URL does not name one.
const DEFAULT_COMFYUI_PORT: u16 = 8188;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local ComfyUI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Port for the load balancer's health checks (default: `port`).
    /// When it differs from `port`, health routes are served on both.
    pub health_port: u16,
    /// Time allowed to produce response headers (default: `30`).
    pub request_timeout_secs: u64,
    /// Base URL of the ComfyUI server (default: `http://127.0.0.1:8188`).
    pub comfyui_url: String,
    /// ComfyUI `main.py`; when set the server is launched and supervised.
    pub comfyui_main: Option<PathBuf>,
    /// Directory holding the workflow templates (default: `/`).
    pub workflow_dir: PathBuf,
    /// How long startup waits for ComfyUI (default: 180s).
    pub startup_timeout: Duration,
    /// Interval between SSE keep-alive comments (default: 15s).
    pub heartbeat_interval: Duration,
    /// Jobs generated concurrently (default: `4`).
    pub worker_pool_size: usize,
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `HOST`                    | `0.0.0.0`                |
    /// | `PORT`                    | `5000`                   |
    /// | `PORT_HEALTH`             | `PORT`                   |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                     |
    /// | `COMFYUI_URL`             | `http://127.0.0.1:8188`  |
    /// | `COMFYUI_MAIN`            | unset                    |
    /// | `WORKFLOW_DIR`            | `/`                      |
    /// | `STARTUP_TIMEOUT_SECS`    | `180`                    |
    /// | `HEARTBEAT_INTERVAL_SECS` | `15`                     |
    /// | `WORKER_POOL_SIZE`        | `4`                      |
    /// | `READY_TIMEOUT_SECS`      | `120`                    |
    /// | `JOB_TIMEOUT_SECS`        | `900`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env_or("PORT", 5000)?;
        let comfyui_main = std::env::var("COMFYUI_MAIN")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host: env_string("HOST", "0.0.0.0"),
            port,
            health_port: env_or("PORT_HEALTH", port)?,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            comfyui_url: env_string("COMFYUI_URL", "http://127.0.0.1:8188"),
            comfyui_main,
            workflow_dir: PathBuf::from(env_string("WORKFLOW_DIR", "/")),
            startup_timeout: env_secs("STARTUP_TIMEOUT_SECS", Duration::from_secs(180))?,
            heartbeat_interval: env_secs("HEARTBEAT_INTERVAL_SECS", Duration::from_secs(15))?,
            worker_pool_size: env_or("WORKER_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            pipeline: PipelineConfig::from_env(Duration::from_secs(120))?,
        })
    }

    /// Port a launched ComfyUI must listen on to match `comfyui_url`.
    pub fn comfyui_port(&self) -> u16 {
        reqwest::Url::parse(&self.comfyui_url)
            .ok()
            .and_then(|url| url.port())
            .unwrap_or(DEFAULT_COMFYUI_PORT)
    }

    /// Whether health routes need their own listener.
    pub fn separate_health_port(&self) -> bool {
        self.health_port != self.port
    }
}
