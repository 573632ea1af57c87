//! Job lifecycle: submit a concrete workflow, poll its history until it
//! completes, fails or runs out of time, then retrieve the produced images.
//!
//! ```text
//! Submitted -> Polling -> Completed
//!                      -> Failed
//!                      -> TimedOut
//! ```
//!
//! ComfyUI offers this client no push notifications, so completion is
//! discovered by polling `/history/{prompt_id}` at a fixed interval. All
//! waiting goes through the injected [`Clock`].

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use relay_comfyui::api::ComfyUIApiError;
use relay_comfyui::backend::ComfyBackend;
use relay_comfyui::history::HistoryEntry;
use relay_core::clock::Clock;

use crate::template::ConcreteJob;

/// Terminal failure of one job run. No stage is retried.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// `/prompt` answered non-2xx (carries the body) or was unreachable.
    #[error("Failed to queue prompt: {0}")]
    QueueRejected(String),

    #[error("Malformed queue response: {0}")]
    MalformedQueueResponse(String),

    /// Carries ComfyUI's `status_str` verbatim.
    #[error("ComfyUI workflow failed: {0}")]
    ExecutionFailed(String),

    #[error("Workflow timed out after {} seconds", .timeout.as_secs())]
    TimedOut { timeout: Duration },
}

impl From<ComfyUIApiError> for JobError {
    fn from(err: ComfyUIApiError) -> Self {
        match err {
            ComfyUIApiError::ApiError { body, .. } => JobError::QueueRejected(body),
            ComfyUIApiError::MalformedResponse(detail) => JobError::MalformedQueueResponse(detail),
            ComfyUIApiError::Request(e) => JobError::QueueRejected(e.to_string()),
        }
    }
}

/// Images produced by one job, as raw bytes in history order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub prompt_id: String,
    pub images: Vec<Vec<u8>>,
    /// Time from submission to retrieval of the last image.
    pub elapsed: Duration,
}

impl JobResult {
    /// Images as standard base64, byte-for-byte.
    pub fn encoded_images(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|bytes| general_purpose::STANDARD.encode(bytes))
            .collect()
    }
}

/// What one history poll says about the job.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// No entry yet, still running, or the history request failed.
    Pending,
    Completed(HistoryEntry),
    Failed(String),
}

impl PollOutcome {
    /// Classify a history entry. Completion wins over an error status.
    pub fn classify(entry: Option<HistoryEntry>) -> Self {
        match entry {
            None => PollOutcome::Pending,
            Some(entry) if entry.is_completed() => PollOutcome::Completed(entry),
            Some(entry) => match entry.error_status() {
                Some(status) => PollOutcome::Failed(status.to_string()),
                None => PollOutcome::Pending,
            },
        }
    }
}

/// Lifecycle state of a job still in flight.
#[derive(Debug)]
pub enum JobState {
    Submitted { prompt_id: String },
    Polling { prompt_id: String, polls: u32 },
}

/// Terminal state of a job run.
#[derive(Debug)]
pub enum JobOutcome {
    Completed { prompt_id: String, entry: HistoryEntry },
    Failed(String),
    TimedOut,
}

/// Runs concrete jobs against one ComfyUI backend.
pub struct JobCoordinator {
    backend: Arc<dyn ComfyBackend>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl JobCoordinator {
    pub fn new(
        backend: Arc<dyn ComfyBackend>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            clock,
            poll_interval,
        }
    }

    /// Submit `job` and drive it to a terminal state.
    ///
    /// Fails with [`JobError::TimedOut`] once `timeout` has elapsed since
    /// submission without the job completing or failing; never earlier.
    pub async fn run(&self, job: &ConcreteJob, timeout: Duration) -> Result<JobResult, JobError> {
        let started = self.clock.now();
        let mut state = self.submit(job).await?;

        let outcome = loop {
            match self.step(state, started, timeout).await {
                ControlFlow::Continue(next) => state = next,
                ControlFlow::Break(outcome) => break outcome,
            }
        };

        match outcome {
            JobOutcome::Completed { prompt_id, entry } => {
                let images = self.retrieve(&prompt_id, &entry).await;
                let elapsed = self.clock.now().saturating_sub(started);
                tracing::info!(
                    prompt_id = %prompt_id,
                    images = images.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Workflow completed",
                );
                Ok(JobResult {
                    prompt_id,
                    images,
                    elapsed,
                })
            }
            JobOutcome::Failed(status) => Err(JobError::ExecutionFailed(status)),
            JobOutcome::TimedOut => Err(JobError::TimedOut { timeout }),
        }
    }

    async fn submit(&self, job: &ConcreteJob) -> Result<JobState, JobError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .backend
            .submit_workflow(job.workflow(), &client_id)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to queue workflow");
                JobError::from(e)
            })?;

        tracing::info!(
            prompt_id = %response.prompt_id,
            queue_position = response.number,
            client_id = %client_id,
            "Workflow queued",
        );
        Ok(JobState::Submitted {
            prompt_id: response.prompt_id,
        })
    }

    /// Advance an in-flight job by one transition.
    async fn step(
        &self,
        state: JobState,
        started: Duration,
        timeout: Duration,
    ) -> ControlFlow<JobOutcome, JobState> {
        let (prompt_id, polls) = match state {
            JobState::Submitted { prompt_id } => {
                return ControlFlow::Continue(JobState::Polling { prompt_id, polls: 0 })
            }
            JobState::Polling { prompt_id, polls } => (prompt_id, polls),
        };

        let elapsed = self.clock.now().saturating_sub(started);
        if elapsed >= timeout {
            tracing::warn!(
                prompt_id = %prompt_id,
                polls,
                elapsed_secs = elapsed.as_secs(),
                "Workflow timed out",
            );
            return ControlFlow::Break(JobOutcome::TimedOut);
        }

        match self.poll(&prompt_id).await {
            PollOutcome::Completed(entry) => {
                ControlFlow::Break(JobOutcome::Completed { prompt_id, entry })
            }
            PollOutcome::Failed(status) => {
                tracing::warn!(prompt_id = %prompt_id, status = %status, "Workflow failed");
                ControlFlow::Break(JobOutcome::Failed(status))
            }
            PollOutcome::Pending => {
                self.clock.sleep(self.poll_interval).await;
                ControlFlow::Continue(JobState::Polling {
                    prompt_id,
                    polls: polls + 1,
                })
            }
        }
    }

    async fn poll(&self, prompt_id: &str) -> PollOutcome {
        match self.backend.get_history(prompt_id).await {
            Ok(entry) => PollOutcome::classify(entry),
            Err(e) => {
                tracing::debug!(prompt_id, error = %e, "History poll failed, retrying");
                PollOutcome::Pending
            }
        }
    }

    /// Fetch every image of a completed entry. An image that cannot be
    /// fetched is left out of the result.
    async fn retrieve(&self, prompt_id: &str, entry: &HistoryEntry) -> Vec<Vec<u8>> {
        let mut images = Vec::new();
        for image in entry.images() {
            match self.backend.view_image(image).await {
                Ok(bytes) => images.push(bytes),
                Err(e) => tracing::warn!(
                    prompt_id,
                    filename = %image.filename,
                    subfolder = %image.subfolder,
                    error = %e,
                    "Skipping output image that could not be fetched",
                ),
            }
        }
        images
    }
}
