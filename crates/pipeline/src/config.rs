use std::time::Duration;

use relay_comfyui::api::ApiTimeouts;
use relay_core::config::{env_secs, ConfigError};

/// Default pre-flight wait for the backend to become ready.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default budget for one job, from submission to retrieval.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(900);

/// Default delay between two history polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default timeout for downloading one source image.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing policy for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long a job waits for the backend before failing.
    pub ready_timeout: Duration,
    /// Interval between readiness probes while waiting.
    pub probe_interval: Duration,
    /// Budget for submit + poll; exceeding it fails the job.
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub download_timeout: Duration,
    /// Per-endpoint timeouts for requests to ComfyUI.
    pub api_timeouts: ApiTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
            probe_interval: relay_comfyui::probe::DEFAULT_PROBE_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            api_timeouts: ApiTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the environment.
    ///
    /// | Env Var              | Default            |
    /// |----------------------|--------------------|
    /// | `JOB_TIMEOUT_SECS`   | `900`              |
    /// | `READY_TIMEOUT_SECS` | `ready_default`    |
    ///
    /// Poll and request timings are not configurable from the environment.
    pub fn from_env(ready_default: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            ready_timeout: env_secs("READY_TIMEOUT_SECS", ready_default)?,
            job_timeout: env_secs("JOB_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT)?,
            ..Self::default()
        })
    }
}
