//! Error types for the bot and the clip pipeline.

use clipmaker_agent::{AgentError, ImageGenError};
use clipmaker_core::ConfigError;
use clipmaker_media::MediaError;
use thiserror::Error;

/// Why a single narration step produced no still.
#[derive(Debug, Error)]
pub enum StepError {
    /// The image backend failed after all attempts.
    #[error("image generation: {0}")]
    Generate(#[from] ImageGenError),

    /// The generated image could not be captioned.
    #[error("compositing: {0}")]
    Compose(#[from] MediaError),
}

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Step generation failed.
    #[error("Step generation failed: {0}")]
    Agent(#[from] AgentError),

    /// Image backend could not be set up.
    #[error("Image backend error: {0}")]
    Image(#[from] ImageGenError),

    /// A step failed and the failure policy is `abort`.
    #[error("Step {index} ({label}) failed: {source}")]
    StepFailed {
        /// Position of the step.
        index: usize,
        /// Step label.
        label: String,
        /// Underlying failure.
        #[source]
        source: StepError,
    },

    /// Every step failed.
    #[error("No images were generated")]
    NoImages,

    /// Compositing or encoding failed.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// A Telegram API call failed.
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A run is already active in this chat.
    #[error("A run is already in progress for this chat")]
    Busy,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    StartFailed(String),
}

/// Result type for pipeline and bot operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
