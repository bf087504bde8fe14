//! Data passed between pipeline stages.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one pipeline invocation.
///
/// Used to namespace the run's temporary files and tagged onto every log line of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in directory names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an image comes from: a remote URL or a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Fetched over HTTP(S).
    Url(String),
    /// Read from the local filesystem.
    Path(PathBuf),
}

impl ImageSource {
    /// Classify a raw reference returned by an image service.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One beat of the narration script.
///
/// Field names on the wire follow the JSON the language model is asked to produce
/// (`{"step": "Step 1", "details": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationStep {
    /// Short label, e.g. "Step 1".
    #[serde(rename = "step")]
    pub label: String,
    /// One sentence of narration.
    #[serde(rename = "details")]
    pub text: String,
}

impl NarrationStep {
    /// Create a new narration step.
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// A generated activity: title, blurb and its ordered steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPlan {
    /// Activity title.
    #[serde(default)]
    pub activity: String,
    /// One-line description of the activity.
    #[serde(default)]
    pub description: String,
    /// Steps in narration order.
    #[serde(default)]
    pub steps: Vec<NarrationStep>,
}

/// A still with its caption burned in, stored in the run workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionedImage {
    /// Position of the originating step in the narration sequence.
    pub index: usize,
    /// Local file path of the PNG.
    pub path: PathBuf,
    /// Caption text (the step's narration).
    pub caption: String,
}

/// The assembled video for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideshowOutput {
    /// Local file path of the MP4.
    pub path: PathBuf,
}
