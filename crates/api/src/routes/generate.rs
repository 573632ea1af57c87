//! POST /generate -- run one job and stream its progress.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::response::sse::Sse;
use axum::response::IntoResponse;
use axum::{routing::post, Json, Router};
use relay_core::job::JobRequest;
use relay_pipeline::runner::GenerationPipeline;

use crate::error::AppResult;
use crate::state::AppState;
use crate::stream::{job_events, GenerateResponse};

/// Hands the job to the worker pool and answers at once with an event
/// stream; the job's result arrives as the stream's final event.
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let request_number = state.service.record_request();
    let Json(request) = payload?;

    tracing::info!(
        request_number,
        job_id = request.job_id_or_unknown(),
        "Generation request accepted",
    );

    let pipeline = Arc::clone(&state.pipeline);
    let job = state.pool.spawn(async move { run_job(&pipeline, request).await });

    Ok((
        [
            (CACHE_CONTROL, "no-cache"),
            // Stops nginx-style proxies from buffering the stream.
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(job_events(job, state.config.heartbeat_interval)),
    ))
}

/// Run the pipeline and fold its outcome into the final event payload.
async fn run_job(pipeline: &GenerationPipeline, request: JobRequest) -> GenerateResponse {
    let started = Instant::now();
    match pipeline.run(&request).await {
        Ok(output) => {
            let elapsed = started.elapsed();
            let images = output.result.encoded_images();
            tracing::info!(
                job_id = %output.job_id,
                images = images.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Job completed",
            );
            GenerateResponse::succeeded(images, elapsed)
        }
        Err(err) => {
            let elapsed = started.elapsed();
            tracing::error!(
                job_id = request.job_id_or_unknown(),
                error = %err,
                elapsed_ms = elapsed.as_millis() as u64,
                "Job failed",
            );
            GenerateResponse::failed(err.to_string(), Some(elapsed))
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}
