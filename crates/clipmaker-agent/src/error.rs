//! Error types for the agent crate.

use thiserror::Error;

/// Errors from chat completion and step generation.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("chat request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status.
    #[error("chat API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The response had no choices or the first choice had no content.
    #[error("chat response contained no content")]
    EmptyContent,

    /// The content was not the JSON object that was asked for.
    #[error("chat response is not valid step JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON parsed but held no activity.
    #[error("chat response contained no activity")]
    NoActivity,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for chat and step operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors from an image generation backend.
#[derive(Error, Debug)]
pub enum ImageGenError {
    /// Connection, timeout or body read failure.
    #[error("image request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("image API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The backend succeeded but returned no image reference.
    #[error("image backend returned no output")]
    EmptyOutput,

    /// The backend reported that generation failed.
    #[error("image generation failed: {0}")]
    PredictionFailed(String),

    /// The response body was not in the expected shape.
    #[error("unexpected image response: {0}")]
    Decode(String),
}

impl ImageGenError {
    /// Whether another attempt may succeed.
    ///
    /// Transport errors, 408, 429, 5xx, empty output and failed predictions are
    /// transient. Other client errors and malformed responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::EmptyOutput | Self::PredictionFailed(_) => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ImageGenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Result type for image generation.
pub type ImageResult<T> = std::result::Result<T, ImageGenError>;
