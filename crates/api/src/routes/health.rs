//! Load-balancer health checks and debug status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub comfyui: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub comfyui: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_requests: u64,
    pub comfyui_status: &'static str,
}

/// GET /ping -- 204 with no body while ComfyUI starts, 200 once ready.
///
/// Load balancers time a cold start from the first 204 to the first 200.
async fn ping(State(state): State<AppState>) -> Response {
    if state.service.is_ready() {
        Json(PingResponse {
            status: "healthy",
            comfyui: "ready",
        })
        .into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// GET /ready -- readiness in words, always 200.
async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let response = if state.service.is_ready() {
        ReadyResponse {
            status: "ready",
            comfyui: "ready",
            message: "ComfyUI is fully initialized and ready to process requests",
        }
    } else {
        ReadyResponse {
            status: "starting",
            comfyui: "initializing",
            message: "ComfyUI is still starting up, please wait...",
        }
    };
    Json(response)
}

/// GET /stats
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        total_requests: state.service.total_requests(),
        comfyui_status: state.comfyui_status(),
    })
}

/// Mount the health routes. Also served on the health port, if separate.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/ready", get(ready))
        .route("/stats", get(stats))
}
