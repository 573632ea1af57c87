//! Workflow templates and placeholder substitution.
//!
//! Templates are ComfyUI API-format workflow documents stored as
//! `workflow_<style>.json` in one directory and read on every job, so a
//! template edited on disk takes effect with the next request.
//!
//! Substitution is textual on the serialized document, in a fixed order:
//! the prompt first, then the reference image, then the subject images.
//! Every substituted value is JSON-string-escaped first, so a prompt full
//! of quotes or braces can only ever land inside the string that held
//! the placeholder.

use std::path::{Path, PathBuf};

use relay_core::job::StyleId;

use crate::stager::AssetRole;

pub const PROMPT_PLACEHOLDER: &str = "PROMPT_PLACEHOLDER";
pub const REFERENCE_PLACEHOLDER: &str = "IMAGE1_PLACEHOLDER";
pub const SUBJECT1_PLACEHOLDER: &str = "IMAGE2_PLACEHOLDER";
pub const SUBJECT2_PLACEHOLDER: &str = "IMAGE3_PLACEHOLDER";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Workflow template not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read workflow template {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Workflow template is corrupt: {0}")]
    Corrupt(String),

    #[error("No staged image for the {0:?} role")]
    MissingAsset(AssetRole),
}

/// Asset names ComfyUI assigned to one job's staged images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAssets {
    pub reference: String,
    pub subject1: String,
    pub subject2: Option<String>,
}

/// A fully resolved workflow, ready to queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteJob {
    workflow: serde_json::Value,
}

impl ConcreteJob {
    pub fn workflow(&self) -> &serde_json::Value {
        &self.workflow
    }

    pub fn into_workflow(self) -> serde_json::Value {
        self.workflow
    }
}

/// Directory of style templates.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the template for `style` lives.
    pub fn template_path(&self, style: StyleId) -> PathBuf {
        self.dir.join(format!("workflow_{}.json", style.as_str()))
    }

    /// Read and parse the template for `style`.
    pub async fn load(&self, style: StyleId) -> Result<serde_json::Value, TemplateError> {
        let path = self.template_path(style);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(path))
            }
            Err(source) => return Err(TemplateError::Unreadable { path, source }),
        };
        serde_json::from_str(&text).map_err(|e| TemplateError::Corrupt(e.to_string()))
    }

    /// Load the template for `style` and resolve its placeholders.
    pub async fn build_job(
        &self,
        style: StyleId,
        prompt: &str,
        assets: &StagedAssets,
    ) -> Result<ConcreteJob, TemplateError> {
        let template = self.load(style).await?;
        render(&template, style, prompt, assets)
    }
}

/// Placeholder → asset name pairs for `style`, in substitution order.
fn image_bindings(
    style: StyleId,
    assets: &StagedAssets,
) -> Result<Vec<(&'static str, &str)>, TemplateError> {
    let mut bindings = vec![
        (REFERENCE_PLACEHOLDER, assets.reference.as_str()),
        (SUBJECT1_PLACEHOLDER, assets.subject1.as_str()),
    ];
    if style.is_dual_subject() {
        let subject2 = assets
            .subject2
            .as_deref()
            .ok_or(TemplateError::MissingAsset(AssetRole::Subject2))?;
        bindings.push((SUBJECT2_PLACEHOLDER, subject2));
    }
    Ok(bindings)
}

/// Substitute the prompt and image placeholders of `template`.
pub fn render(
    template: &serde_json::Value,
    style: StyleId,
    prompt: &str,
    assets: &StagedAssets,
) -> Result<ConcreteJob, TemplateError> {
    let mut text = template.to_string();

    text = substitute(&text, PROMPT_PLACEHOLDER, prompt);
    for (placeholder, name) in image_bindings(style, assets)? {
        text = substitute(&text, placeholder, name);
    }

    let workflow = serde_json::from_str(&text).map_err(|e| TemplateError::Corrupt(e.to_string()))?;
    Ok(ConcreteJob { workflow })
}

fn substitute(text: &str, placeholder: &str, value: &str) -> String {
    let occurrences = text.matches(placeholder).count();
    if occurrences == 0 {
        tracing::warn!(placeholder, "Placeholder not present in workflow template");
        return text.to_string();
    }
    tracing::trace!(placeholder, occurrences, "Substituting placeholder");
    text.replace(placeholder, &json_escape(value))
}

/// `value` as the inside of a JSON string literal.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
