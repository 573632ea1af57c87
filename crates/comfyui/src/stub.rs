//! In-process stand-in for a ComfyUI server, for integration tests.
//!
//! Serves the five ComfyUI endpoints the relay uses plus
//! `GET /source/{name}` for the caller's source images, so one server
//! plays both the image host and the generation backend. Every request
//! is counted and uploads/submissions are recorded for assertions.
//!
//! Enabled with the `stub-server` feature.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

/// Prompt id handed out by the stub's `/prompt`.
pub const STUB_PROMPT_ID: &str = "stub-prompt-1";

/// What `POST /prompt` answers.
#[derive(Debug, Clone, Default)]
pub enum QueueBehavior {
    #[default]
    Accept,
    /// Non-2xx status with the given body.
    Reject { status: u16, body: String },
    /// 200 with a body lacking `prompt_id`.
    Malformed,
}

/// What `GET /history/{prompt_id}` reports once the entry exists.
#[derive(Debug, Clone, Default)]
pub enum HistoryBehavior {
    #[default]
    Completed,
    /// Present but never completed and never errored.
    Running,
    /// Present, not completed, with this `status_str`.
    Failed(String),
    /// Every poll answers 500.
    Unavailable,
}

/// An image the stub reports as produced.
#[derive(Debug, Clone)]
pub struct StubOutput {
    pub filename: String,
    pub subfolder: String,
    pub bytes: Vec<u8>,
    /// `/view` answers 404 for this image.
    pub missing: bool,
}

impl StubOutput {
    pub fn new(filename: &str, bytes: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            subfolder: String::new(),
            bytes: bytes.to_vec(),
            missing: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    /// Images served at `/source/{name}`; other names answer 404.
    pub sources: HashMap<String, Vec<u8>>,
    /// Number of `/system_stats` calls answered 503 before the first 200.
    pub stats_failures: u32,
    /// When set, `/upload/image` answers with this status.
    pub upload_status: Option<u16>,
    /// Prefix added to uploaded names to mimic server-side renaming.
    pub upload_name_prefix: String,
    pub queue: QueueBehavior,
    pub history: HistoryBehavior,
    /// Number of history polls answered `{}` before the entry appears.
    pub history_delay_polls: u32,
    pub outputs: Vec<StubOutput>,
}

/// An upload as the stub received it.
#[derive(Debug, Clone, Default)]
pub struct UploadRecord {
    pub file_name: String,
    pub content_type: Option<String>,
    pub kind: String,
    pub overwrite: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct Shared {
    config: StubConfig,
    requests: AtomicUsize,
    stats_calls: AtomicU32,
    history_polls: AtomicU32,
    uploads: Mutex<Vec<UploadRecord>>,
    prompts: Mutex<Vec<serde_json::Value>>,
}

impl Shared {
    fn hit(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// A running stub server. The server task lives as long as the test runtime.
pub struct StubComfyUI {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl StubComfyUI {
    /// Bind to an ephemeral localhost port and start serving.
    pub async fn start(config: StubConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            ..Default::default()
        });

        let app = Router::new()
            .route("/system_stats", get(system_stats))
            .route("/upload/image", post(upload_image))
            .route("/prompt", post(queue_prompt))
            .route("/history/{prompt_id}", get(history))
            .route("/view", get(view))
            .route("/source/{name}", get(source))
            .with_state(Arc::clone(&shared));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, shared }
    }

    /// Base URL to use as the ComfyUI API URL.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a source image served by this stub.
    pub fn source_url(&self, name: &str) -> String {
        format!("{}/source/{}", self.base_url(), name)
    }

    /// Total number of requests received on any route.
    pub fn request_count(&self) -> usize {
        self.shared.requests.load(Ordering::SeqCst)
    }

    pub fn history_polls(&self) -> u32 {
        self.shared.history_polls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.shared.uploads.lock().expect("uploads lock").clone()
    }

    /// The `prompt` field of every submitted workflow.
    pub fn prompts(&self) -> Vec<serde_json::Value> {
        self.shared.prompts.lock().expect("prompts lock").clone()
    }
}

async fn system_stats(State(shared): State<Arc<Shared>>) -> Response {
    shared.hit();
    let call = shared.stats_calls.fetch_add(1, Ordering::SeqCst);
    if call < shared.config.stats_failures {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "system": { "os": "stub" }, "devices": [] })).into_response()
}

async fn upload_image(State(shared): State<Arc<Shared>>, mut multipart: Multipart) -> Response {
    shared.hit();
    if let Some(status) = shared.config.upload_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "upload rejected").into_response();
    }

    let mut record = UploadRecord::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                record.file_name = field.file_name().unwrap_or_default().to_string();
                record.content_type = field.content_type().map(str::to_string);
                record.bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            "type" => record.kind = field.text().await.unwrap_or_default(),
            "overwrite" => record.overwrite = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }

    let assigned = format!("{}{}", shared.config.upload_name_prefix, record.file_name);
    shared.uploads.lock().expect("uploads lock").push(record);
    Json(json!({ "name": assigned, "subfolder": "", "type": "input" })).into_response()
}

async fn queue_prompt(
    State(shared): State<Arc<Shared>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    shared.hit();
    shared
        .prompts
        .lock()
        .expect("prompts lock")
        .push(body.get("prompt").cloned().unwrap_or_default());

    match &shared.config.queue {
        QueueBehavior::Accept => {
            Json(json!({ "prompt_id": STUB_PROMPT_ID, "number": 0, "node_errors": {} }))
                .into_response()
        }
        QueueBehavior::Reject { status, body } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST);
            (status, body.clone()).into_response()
        }
        QueueBehavior::Malformed => Json(json!({ "error": "no prompt id" })).into_response(),
    }
}

async fn history(State(shared): State<Arc<Shared>>, Path(prompt_id): Path<String>) -> Response {
    shared.hit();
    let poll = shared.history_polls.fetch_add(1, Ordering::SeqCst);
    if matches!(shared.config.history, HistoryBehavior::Unavailable) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if poll < shared.config.history_delay_polls {
        return Json(json!({})).into_response();
    }

    let images: Vec<_> = shared
        .config
        .outputs
        .iter()
        .map(|o| json!({ "filename": o.filename, "subfolder": o.subfolder, "type": "output" }))
        .collect();

    let entry = match &shared.config.history {
        HistoryBehavior::Completed => json!({
            "status": { "completed": true, "status_str": "success" },
            "outputs": { "9": { "images": images } },
        }),
        HistoryBehavior::Running => json!({
            "status": { "completed": false, "status_str": "running" },
            "outputs": {},
        }),
        HistoryBehavior::Failed(status_str) => json!({
            "status": { "completed": false, "status_str": status_str },
            "outputs": {},
        }),
        HistoryBehavior::Unavailable => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    Json(json!({ prompt_id: entry })).into_response()
}

#[derive(Deserialize)]
struct ViewParams {
    filename: String,
    #[serde(default)]
    subfolder: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn view(State(shared): State<Arc<Shared>>, Query(params): Query<ViewParams>) -> Response {
    shared.hit();
    let found = shared.config.outputs.iter().find(|o| {
        o.filename == params.filename && o.subfolder == params.subfolder && params.kind == "output"
    });
    match found {
        Some(output) if !output.missing => {
            ([(header::CONTENT_TYPE, "image/png")], output.bytes.clone()).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn source(State(shared): State<Arc<Shared>>, Path(name): Path<String>) -> Response {
    shared.hit();
    match shared.config.sources.get(&name) {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
