//! Server-sent event stream for one generation job.
//!
//! The stream opens with a keep-alive comment, repeats it every heartbeat
//! interval while the job runs, and ends with exactly one `data:` event
//! carrying the [`GenerateResponse`]. Keep-alives stop proxies from
//! closing a connection that is idle for the length of a generation.
//!
//! Dropping the stream (client disconnect) does not cancel the job.

use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Text of every keep-alive comment.
pub const KEEP_ALIVE: &str = "keep-alive";

/// Result payload of the final event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    /// Base64 images, in output order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds spent on the job, queueing in the pool excluded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl GenerateResponse {
    pub fn succeeded(images: Vec<String>, execution_time: Duration) -> Self {
        Self {
            success: true,
            images: Some(images),
            error: None,
            execution_time: Some(execution_time.as_secs_f64()),
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: Option<Duration>) -> Self {
        Self {
            success: false,
            images: None,
            error: Some(error.into()),
            execution_time: execution_time.map(|d| d.as_secs_f64()),
        }
    }
}

enum StreamState {
    Opening(JoinHandle<GenerateResponse>, Duration),
    Running(JoinHandle<GenerateResponse>, Interval),
    Finished,
}

/// Events for `job`: keep-alives until it finishes, then its result.
pub fn job_events(
    job: JoinHandle<GenerateResponse>,
    heartbeat: Duration,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    futures::stream::unfold(StreamState::Opening(job, heartbeat), |state| async move {
        match state {
            StreamState::Opening(job, heartbeat) => {
                let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some((keep_alive(), StreamState::Running(job, ticker)))
            }
            StreamState::Running(mut job, mut ticker) => {
                tokio::select! {
                    biased;
                    joined = &mut job => {
                        let response = joined.unwrap_or_else(|e| {
                            tracing::error!(error = %e, "Generation task did not complete");
                            GenerateResponse::failed(format!("Generation task failed: {e}"), None)
                        });
                        Some((Event::default().json_data(&response), StreamState::Finished))
                    }
                    _ = ticker.tick() => Some((keep_alive(), StreamState::Running(job, ticker))),
                }
            }
            StreamState::Finished => None,
        }
    })
}

fn keep_alive() -> Result<Event, axum::Error> {
    Ok(Event::default().comment(KEEP_ALIVE))
}
