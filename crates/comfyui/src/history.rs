//! Typed view of the ComfyUI `/history/{prompt_id}` response.
//!
//! The endpoint returns `{"<prompt_id>": {"status": {...}, "outputs": {...}}}`
//! and an empty object while the prompt is still queued or running.
//! Only the fields the relay reads are modelled; everything else is ignored.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default value of an image record's `type` field.
const DEFAULT_IMAGE_TYPE: &str = "output";

/// The full history document, keyed by prompt id.
///
/// Node outputs keep the order in which ComfyUI listed them.
pub type HistoryDocument = IndexMap<String, HistoryEntry>;

/// One prompt's execution record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    /// Output per node id.
    #[serde(default)]
    pub outputs: IndexMap<String, NodeOutput>,
}

/// Execution status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub status_str: Option<String>,
}

/// Output of a single node. Nodes that produce no images omit the key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Location of a produced image, passed back verbatim to `/view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_type")]
    pub kind: String,
}

fn default_image_type() -> String {
    DEFAULT_IMAGE_TYPE.to_string()
}

impl HistoryEntry {
    /// Whether ComfyUI marked the prompt as completed.
    pub fn is_completed(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.completed)
    }

    /// The status string if it reports an error (case-insensitive match on `error`).
    pub fn error_status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .filter(|s| s.to_ascii_lowercase().contains("error"))
    }

    /// All produced images, in node order then image order.
    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        self.outputs.values().flat_map(|node| node.images.iter())
    }
}

/// Parse a raw history response body and extract the entry for `prompt_id`.
pub fn parse_history(body: &str, prompt_id: &str) -> Result<Option<HistoryEntry>, serde_json::Error> {
    let mut document: HistoryDocument = serde_json::from_str(body)?;
    Ok(document.shift_remove(prompt_id))
}
