//! The one generation pipeline both front ends share.

use std::path::PathBuf;
use std::sync::Arc;

use relay_comfyui::api::ComfyUIApi;
use relay_comfyui::backend::ComfyBackend;
use relay_comfyui::probe::ReadinessProber;
use relay_core::clock::{Clock, SystemClock};
use relay_core::job::{JobRequest, StyleId};
use relay_core::state::ServiceState;

use crate::config::PipelineConfig;
use crate::coordinator::{JobCoordinator, JobResult};
use crate::error::PipelineError;
use crate::stager::{AssetRole, AssetStager, HttpImageSource, ImageSource};
use crate::template::{StagedAssets, TemplateStore};

/// A successfully generated job.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub job_id: String,
    pub style: StyleId,
    pub result: JobResult,
}

/// Everything a job run needs, owned explicitly so tests can substitute
/// any collaborator.
pub struct GenerationPipeline {
    prober: ReadinessProber,
    stager: AssetStager,
    templates: TemplateStore,
    coordinator: JobCoordinator,
    config: PipelineConfig,
}

impl GenerationPipeline {
    pub fn new(
        backend: Arc<dyn ComfyBackend>,
        source: Arc<dyn ImageSource>,
        templates: TemplateStore,
        clock: Arc<dyn Clock>,
        state: Arc<ServiceState>,
        config: PipelineConfig,
    ) -> Self {
        let prober = ReadinessProber::new(Arc::clone(&backend), Arc::clone(&clock), state)
            .interval(config.probe_interval);
        let stager = AssetStager::new(source, Arc::clone(&backend));
        let coordinator = JobCoordinator::new(backend, clock, config.poll_interval);
        Self {
            prober,
            stager,
            templates,
            coordinator,
            config,
        }
    }

    /// Production wiring: a ComfyUI HTTP client at `comfyui_url` and an
    /// HTTP image source sharing one connection pool, on the system clock.
    pub fn connect(
        comfyui_url: &str,
        workflow_dir: impl Into<PathBuf>,
        state: Arc<ServiceState>,
        config: PipelineConfig,
    ) -> Self {
        let client = reqwest::Client::new();
        let backend = ComfyUIApi::with_client(client.clone(), comfyui_url)
            .timeouts(config.api_timeouts.clone());
        let source = HttpImageSource::new(client, config.download_timeout);
        Self::new(
            Arc::new(backend),
            Arc::new(source),
            TemplateStore::new(workflow_dir),
            Arc::new(SystemClock::new()),
            state,
            config,
        )
    }

    pub fn prober(&self) -> &ReadinessProber {
        &self.prober
    }

    pub fn state(&self) -> &Arc<ServiceState> {
        self.prober.state()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one job from request to retrieved images.
    ///
    /// The request is validated before any network call. Every failure
    /// aborts the remaining stages.
    pub async fn run(&self, request: &JobRequest) -> Result<GenerationOutput, PipelineError> {
        let job = request.validate()?;

        self.prober.ensure_ready(self.config.ready_timeout).await?;

        tracing::info!(job_id = %job.job_id, style = %job.style, "Processing job");

        let reference = self
            .stager
            .stage(&job.reference_image_url, AssetRole::Reference)
            .await?;
        let subject1 = self
            .stager
            .stage(&job.user_image1_url, AssetRole::Subject1)
            .await?;
        let subject2 = match &job.user_image2_url {
            Some(url) => Some(self.stager.stage(url, AssetRole::Subject2).await?),
            None => None,
        };
        let assets = StagedAssets {
            reference,
            subject1,
            subject2,
        };

        let concrete = self
            .templates
            .build_job(job.style, &job.prompt, &assets)
            .await?;
        let result = self.coordinator.run(&concrete, self.config.job_timeout).await?;

        Ok(GenerationOutput {
            job_id: job.job_id,
            style: job.style,
            result,
        })
    }
}
