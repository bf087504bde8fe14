//! Clipmaker Core - shared pieces used by every Clipmaker crate.
//!
//! - **config**: environment loading and typed configuration
//! - **error**: configuration errors
//! - **models**: narration steps, image sources, captioned stills, run ids
//! - **retry**: bounded retry with exponential backoff
//! - **workspace**: per-run scratch directory with guaranteed cleanup

pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod workspace;

pub use config::{
    config_dir, ensure_all_dirs, env_file, load_env_files, runs_dir, state_dir, CaptionStyle,
    ChatConfig, ClipmakerConfig, ImageBackendConfig, ImageConfig, PromptMode, SlideshowConfig,
    StepFailurePolicy, TelegramConfig,
};
pub use error::{ConfigError, Result};
pub use models::{CaptionedImage, ImageSource, NarrationStep, RunId, SlideshowOutput, StepPlan};
pub use retry::RetryPolicy;
pub use workspace::RunWorkspace;
