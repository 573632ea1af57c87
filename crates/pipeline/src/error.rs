use relay_comfyui::probe::ProbeError;
use relay_core::error::CoreError;

use crate::coordinator::JobError;
use crate::stager::StageError;
use crate::template::TemplateError;

/// Every way a generation job can fail.
///
/// Each failure is terminal for its job. The display string is the
/// human-readable error returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing or inconsistent request fields; raised before any network call.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("Unknown styleId: {0}")]
    UnknownStyle(String),

    /// The backend never answered a readiness probe in time.
    #[error(transparent)]
    DownstreamUnreachable(#[from] ProbeError),

    /// A source image could not be downloaded or uploaded.
    #[error(transparent)]
    Staging(#[from] StageError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Queueing, execution, or the job's own timeout.
    #[error(transparent)]
    Job(#[from] JobError),
}

impl PipelineError {
    /// Whether the request was missing required fields. These failures
    /// are reported without a job id.
    pub fn is_rejected_request(&self) -> bool {
        matches!(self, PipelineError::ValidationFailed(_))
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => PipelineError::ValidationFailed(msg),
            CoreError::UnknownStyle(style) => PipelineError::UnknownStyle(style),
        }
    }
}
