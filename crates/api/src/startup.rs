//! Startup supervision: wait for ComfyUI to come up, and watch a
//! launched server for an early exit.

use std::sync::Arc;
use std::time::Duration;

use relay_comfyui::probe::ProbeError;
use relay_comfyui::process::ComfyUIProcess;
use relay_pipeline::runner::GenerationPipeline;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("ComfyUI exited during startup (exit code {code:?})")]
    Exited { code: Option<i32> },

    #[error(transparent)]
    NotReady(#[from] ProbeError),
}

/// Probe ComfyUI in the background until it is ready.
///
/// With a launched process the probe races its exit, and either an exit
/// or a probe timeout is an error. An external ComfyUI that is slow to
/// appear is only logged; requests keep probing on their own.
pub fn spawn(
    pipeline: Arc<GenerationPipeline>,
    process: Option<Arc<ComfyUIProcess>>,
    timeout: Duration,
) -> JoinHandle<Result<(), StartupError>> {
    tokio::spawn(async move {
        let probe = pipeline.prober().probe(timeout);

        let Some(process) = process else {
            match probe.await {
                Ok(elapsed) => tracing::info!(elapsed_secs = elapsed.as_secs(), "ComfyUI is up"),
                Err(e) => tracing::warn!(error = %e, "External ComfyUI not ready yet"),
            }
            return Ok(());
        };

        tokio::select! {
            result = probe => {
                let elapsed = result?;
                tracing::info!(elapsed_secs = elapsed.as_secs(), pid = process.pid(), "ComfyUI is up");
                Ok(())
            }
            exit = process.exited() => Err(StartupError::Exited { code: exit.code }),
        }
    })
}
