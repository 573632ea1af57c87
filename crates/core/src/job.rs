//! Caller-facing job request and its validated form.
//!
//! Both front ends accept the same camelCase JSON object. Fields are
//! parsed leniently (everything optional) and then checked by
//! [`JobRequest::validate`], so a malformed request produces a
//! human-readable validation message instead of a deserialization error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Message returned when any of the always-required fields is missing.
pub const MISSING_REQUIRED_FIELDS: &str =
    "Missing required fields: jobId, userImage1Url, referenceImageUrl";

/// Message returned when a dual-subject request lacks its second image.
pub const MISSING_SECOND_SUBJECT: &str = "Missing userImage2Url for couples style";

/// Job identifier reported when the request carried none.
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// Style selector choosing the workflow template and role mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleId {
    /// One subject image plus a reference/style image.
    #[default]
    Single,
    /// Two subject images plus a reference/style image.
    Couples,
}

impl StyleId {
    /// Wire name of the style (`single` / `couples`).
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleId::Single => "single",
            StyleId::Couples => "couples",
        }
    }

    /// Whether this style needs a second subject image.
    pub fn is_dual_subject(&self) -> bool {
        matches!(self, StyleId::Couples)
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(StyleId::Single),
            "couples" => Ok(StyleId::Couples),
            other => Err(CoreError::UnknownStyle(other.to_string())),
        }
    }
}

/// A job request exactly as the caller sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRequest {
    pub job_id: Option<String>,
    pub style_id: Option<String>,
    pub user_image1_url: Option<String>,
    pub user_image2_url: Option<String>,
    pub reference_image_url: Option<String>,
    pub prompt: Option<String>,
}

/// A request that passed validation; every field the pipeline needs is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedJob {
    pub job_id: String,
    pub style: StyleId,
    pub reference_image_url: String,
    pub user_image1_url: String,
    /// Always `Some` for [`StyleId::Couples`]. A second image sent with a
    /// single-subject style is still staged but no template slot uses it.
    pub user_image2_url: Option<String>,
    pub prompt: String,
}

impl JobRequest {
    /// The caller's job id, or [`UNKNOWN_JOB_ID`] when absent.
    pub fn job_id_or_unknown(&self) -> &str {
        non_empty(&self.job_id).unwrap_or(UNKNOWN_JOB_ID)
    }

    /// Check required fields and resolve the style selector.
    ///
    /// Empty strings count as missing. A missing `styleId` means
    /// `single`, a missing `prompt` means the empty prompt.
    pub fn validate(&self) -> Result<ValidatedJob, CoreError> {
        let (Some(job_id), Some(user_image1_url), Some(reference_image_url)) = (
            non_empty(&self.job_id),
            non_empty(&self.user_image1_url),
            non_empty(&self.reference_image_url),
        ) else {
            return Err(CoreError::Validation(MISSING_REQUIRED_FIELDS.to_string()));
        };

        let style = match non_empty(&self.style_id) {
            Some(s) => s.parse::<StyleId>()?,
            None => StyleId::default(),
        };

        let user_image2_url = non_empty(&self.user_image2_url).map(str::to_string);
        if style.is_dual_subject() && user_image2_url.is_none() {
            return Err(CoreError::Validation(MISSING_SECOND_SUBJECT.to_string()));
        }

        Ok(ValidatedJob {
            job_id: job_id.to_string(),
            style,
            reference_image_url: reference_image_url.to_string(),
            user_image1_url: user_image1_url.to_string(),
            user_image2_url,
            prompt: self.prompt.clone().unwrap_or_default(),
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
