use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / -- service description and endpoint list.
async fn index(State(state): State<AppState>) -> Json<Value> {
    let status = if state.service.is_ready() { "ready" } else { "starting" };
    Json(json!({
        "service": "ComfyUI Load Balancer Worker",
        "version": env!("CARGO_PKG_VERSION"),
        "status": status,
        "endpoints": {
            "POST /generate": "Generate images (SSE stream, final event carries the result)",
            "GET /ping": "Health check: 204 while ComfyUI starts, 200 once ready",
            "GET /ready": "ComfyUI readiness check",
            "GET /stats": "Service statistics",
        },
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}
