//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use relay_comfyui::api::{ComfyUIApiError, SubmitResponse};
use relay_comfyui::backend::ComfyBackend;
use relay_comfyui::history::{HistoryEntry, ImageRef};
use serde_json::json;

use crate::stager::{FetchError, ImageSource};

/// How `/prompt` answers.
pub(crate) enum SubmitScript {
    Accept(&'static str),
    Reject(&'static str),
    Malformed(&'static str),
}

/// One `/history` answer. The last scripted answer repeats forever.
#[derive(Clone)]
pub(crate) enum PollScript {
    Absent,
    Errored,
    Running,
    Completed(Vec<&'static str>),
    Failed(&'static str),
}

impl PollScript {
    fn answer(&self) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        let entry = match self {
            PollScript::Absent => return Ok(None),
            PollScript::Errored => {
                return Err(ComfyUIApiError::ApiError {
                    status: 502,
                    body: "bad gateway".into(),
                })
            }
            PollScript::Running => json!({
                "status": { "completed": false, "status_str": "running" },
                "outputs": {},
            }),
            PollScript::Completed(names) => json!({
                "status": { "completed": true, "status_str": "success" },
                "outputs": {
                    "9": { "images": names.iter().map(|n| json!({
                        "filename": n, "subfolder": "", "type": "output",
                    })).collect::<Vec<_>>() },
                },
            }),
            PollScript::Failed(status) => json!({
                "status": { "completed": false, "status_str": status },
                "outputs": {},
            }),
        };
        Ok(Some(serde_json::from_value(entry).expect("scripted history entry")))
    }
}

/// Bytes the scripted backend serves for an output image.
pub(crate) fn output_bytes(filename: &str) -> Vec<u8> {
    format!("\u{89}PNG:{filename}").into_bytes()
}

/// A [`ComfyBackend`] that answers from a script and records every call.
pub(crate) struct ScriptedBackend {
    stats_failures: u32,
    upload_rejection: Option<String>,
    upload_prefix: String,
    submit: SubmitScript,
    polls: Mutex<VecDeque<PollScript>>,
    missing_images: HashSet<String>,

    stats_calls: AtomicU32,
    history_calls: AtomicU32,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    submissions: Mutex<Vec<(serde_json::Value, String)>>,
    views: Mutex<Vec<ImageRef>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            stats_failures: 0,
            upload_rejection: None,
            upload_prefix: String::new(),
            submit: SubmitScript::Accept("prompt-1"),
            polls: Mutex::new(VecDeque::from([PollScript::Completed(vec!["out_1.png"])])),
            missing_images: HashSet::new(),
            stats_calls: AtomicU32::new(0),
            history_calls: AtomicU32::new(0),
            uploads: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn not_ready_for(mut self, failures: u32) -> Self {
        self.stats_failures = failures;
        self
    }

    pub(crate) fn rename_uploads(mut self, prefix: &str) -> Self {
        self.upload_prefix = prefix.to_string();
        self
    }

    pub(crate) fn reject_uploads(mut self, body: &str) -> Self {
        self.upload_rejection = Some(body.to_string());
        self
    }

    pub(crate) fn submit(mut self, script: SubmitScript) -> Self {
        self.submit = script;
        self
    }

    pub(crate) fn polls(self, polls: Vec<PollScript>) -> Self {
        *self.polls.lock().unwrap() = polls.into();
        self
    }

    pub(crate) fn missing_image(mut self, filename: &str) -> Self {
        self.missing_images.insert(filename.to_string());
        self
    }

    pub(crate) fn stats_calls(&self) -> u32 {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }

    /// `(requested name, bytes)` of every upload.
    pub(crate) fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    /// `(workflow, client_id)` of every submission.
    pub(crate) fn submissions(&self) -> Vec<(serde_json::Value, String)> {
        self.submissions.lock().unwrap().clone()
    }

    pub(crate) fn views(&self) -> Vec<ImageRef> {
        self.views.lock().unwrap().clone()
    }

    fn next_poll(&self) -> PollScript {
        let mut polls = self.polls.lock().unwrap();
        if polls.len() > 1 {
            polls.pop_front().unwrap_or(PollScript::Absent)
        } else {
            polls.front().cloned().unwrap_or(PollScript::Absent)
        }
    }
}

#[async_trait]
impl ComfyBackend for ScriptedBackend {
    async fn system_stats(&self) -> Result<(), ComfyUIApiError> {
        let call = self.stats_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.stats_failures {
            return Err(ComfyUIApiError::ApiError {
                status: 503,
                body: "starting".into(),
            });
        }
        Ok(())
    }

    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String, ComfyUIApiError> {
        if let Some(body) = &self.upload_rejection {
            return Err(ComfyUIApiError::ApiError {
                status: 500,
                body: body.clone(),
            });
        }
        self.uploads.lock().unwrap().push((name.to_string(), bytes));
        Ok(format!("{}{}", self.upload_prefix, name))
    }

    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submissions
            .lock()
            .unwrap()
            .push((workflow.clone(), client_id.to_string()));
        match &self.submit {
            SubmitScript::Accept(prompt_id) => Ok(SubmitResponse {
                prompt_id: prompt_id.to_string(),
                number: 0,
            }),
            SubmitScript::Reject(body) => Err(ComfyUIApiError::ApiError {
                status: 400,
                body: body.to_string(),
            }),
            SubmitScript::Malformed(detail) => {
                Err(ComfyUIApiError::MalformedResponse(detail.to_string()))
            }
        }
    }

    async fn get_history(&self, _: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.next_poll().answer()
    }

    async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.views.lock().unwrap().push(image.clone());
        if self.missing_images.contains(&image.filename) {
            return Err(ComfyUIApiError::ApiError {
                status: 404,
                body: "not found".into(),
            });
        }
        Ok(output_bytes(&image.filename))
    }
}

/// An [`ImageSource`] serving fixed bytes per URL; unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct StaticImageSource {
    images: HashMap<String, Vec<u8>>,
    fetches: AtomicU32,
}

impl StaticImageSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub(crate) fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.images.get(url).cloned().ok_or(FetchError::Status(404))
    }
}
