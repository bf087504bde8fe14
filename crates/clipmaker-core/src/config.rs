//! Configuration for Clipmaker.
//!
//! Secrets and tunables are read from the environment once at startup and turned
//! into typed structs that are handed to each component's constructor. Nothing
//! downstream reads the environment on its own.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.clipmaker/
//! └── config/       # .env.local with secrets
//!
//! $TMPDIR/clipmaker/  # per-run scratch directories (removed after each run)
//! ```
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `OPENAI_API_KEY`: Chat completion (and optionally image) API key
//! - `REPLICATE_API_TOKEN`: when `CLIPMAKER_IMAGE_BACKEND=replicate` (default)
//! - `FAL_KEY`: when `CLIPMAKER_IMAGE_BACKEND=fal`
//!
//! Optional:
//! - `CLIPMAKER_STATE_DIR`, `CLIPMAKER_RUNS_DIR`: storage overrides
//! - `OPENAI_BASE_URL`, `CLIPMAKER_CHAT_MODEL`, `CLIPMAKER_TEMPERATURE`
//! - `CLIPMAKER_TOPIC`, `CLIPMAKER_PRODUCT`
//! - `CLIPMAKER_IMAGE_BACKEND` (`replicate` | `fal` | `openai`)
//! - `CLIPMAKER_PROMPT_MODE` (`theme` | `theme_with_step`), `CLIPMAKER_STYLE_PROMPT`
//! - `CLIPMAKER_AUDIO_PATH`, `CLIPMAKER_FFMPEG`, `CLIPMAKER_SLIDE_SECONDS`, `CLIPMAKER_FPS`
//! - `CLIPMAKER_RETRY_ATTEMPTS`, `CLIPMAKER_RETRY_BACKOFF_MS`, `CLIPMAKER_RETRY_MAX_BACKOFF_MS`
//! - `CLIPMAKER_ON_STEP_FAILURE` (`skip` | `abort`)
//! - `CLIPMAKER_FETCH_TIMEOUT_SECS`

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::retry::RetryPolicy;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "CLIPMAKER_STATE_DIR";

/// Environment variable for custom run scratch directory.
pub const RUNS_DIR_ENV: &str = "CLIPMAKER_RUNS_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".clipmaker";

const CONFIG_SUBDIR: &str = "config";

/// Default style keywords appended to every image prompt.
pub const DEFAULT_STYLE_PROMPT: &str = "Boosts cellular energy, enhancing your meditation experience. photorealism, bohemian style, pink and blue pastel color, hyper-realistic";

/// Default negative prompt for diffusion backends.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "nsfw, erotic, violence, people, animals";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Clipmaker state directory.
///
/// The state directory is determined by:
/// 1. `CLIPMAKER_STATE_DIR` environment variable if set
/// 2. `~/.clipmaker` if home directory is available
/// 3. `.clipmaker` in current directory as fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the user config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// Get the .env.local file path.
///
/// Environment file for secrets (API keys, tokens).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the directory that holds per-run workspaces.
///
/// Defaults to `clipmaker/` under the system temp directory, or `CLIPMAKER_RUNS_DIR`.
pub fn runs_dir() -> PathBuf {
    std::env::var(RUNS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_runs_dir())
}

fn default_runs_dir() -> PathBuf {
    std::env::temp_dir().join("clipmaker")
}

/// Ensure the config and runs directories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(runs_dir())?;
    Ok(())
}

/// Load environment files.
///
/// The config directory's `.env.local` is read first, then `.env.local` or `.env`
/// in the working directory. Variables already set in the process win.
pub fn load_env_files() {
    let env_path = env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
}

/// What to do when one step's image cannot be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFailurePolicy {
    /// Drop the step and keep going with the rest.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

impl FromStr for StepFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "continue" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(format!("expected 'skip' or 'abort', got '{}'", other)),
        }
    }
}

/// How the image prompt is built for each step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Style phrase only; every step gets the same prompt.
    #[default]
    Theme,
    /// Style phrase followed by the step's narration.
    ThemeWithStep,
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theme" => Ok(Self::Theme),
            "theme_with_step" | "theme-with-step" | "step" => Ok(Self::ThemeWithStep),
            other => Err(format!("expected 'theme' or 'theme_with_step', got '{}'", other)),
        }
    }
}

/// Telegram settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token.
    pub bot_token: String,
}

/// Chat completion settings for the step generator.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API key (bearer).
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
    /// Topic of the generated activity.
    pub topic: String,
    /// Product keyword the third step must mention.
    pub product: String,
}

impl ChatConfig {
    /// Chat settings with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            timeout: Duration::from_secs(120),
            topic: "meditation".into(),
            product: "NAD+".into(),
        }
    }
}

/// Which image generation service to call, with its settings.
#[derive(Debug, Clone)]
pub enum ImageBackendConfig {
    /// Replicate predictions API (diffusion models).
    Replicate {
        /// API token.
        api_token: String,
        /// Model in `owner/name` form.
        model: String,
        /// Negative prompt.
        negative_prompt: String,
        /// Classifier-free guidance scale.
        guidance_scale: f32,
        /// Denoising steps.
        num_inference_steps: u32,
        /// Aspect ratio, e.g. "9:16".
        aspect_ratio: String,
    },
    /// fal.ai synchronous run endpoint.
    Fal {
        /// API key.
        api_key: String,
        /// Model path, e.g. "fal-ai/flux/dev".
        model: String,
    },
    /// OpenAI images API.
    OpenAi {
        /// API key.
        api_key: String,
        /// Base URL of the API.
        base_url: String,
        /// Model identifier.
        model: String,
        /// Size string, e.g. "1024x1792".
        size: String,
    },
}

impl ImageBackendConfig {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replicate { .. } => "replicate",
            Self::Fal { .. } => "fal",
            Self::OpenAi { .. } => "openai",
        }
    }
}

/// Image generation settings.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Backend and its settings.
    pub backend: ImageBackendConfig,
    /// How prompts are built.
    pub prompt_mode: PromptMode,
    /// Style phrase used in every prompt.
    pub style_prompt: String,
    /// Timeout for downloading generated images.
    pub fetch_timeout: Duration,
    /// Retry schedule for generation calls.
    pub retry: RetryPolicy,
    /// Behaviour when a step ultimately fails.
    pub on_step_failure: StepFailurePolicy,
}

/// Caption overlay layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    /// Font size in pixels.
    pub font_size: f32,
    /// Vertical distance between line centres.
    pub line_height: f32,
    /// Horizontal padding of each line box.
    pub padding_x: f32,
    /// Vertical padding of each line box.
    pub padding_y: f32,
    /// Estimated glyph width as a fraction of the font size.
    pub char_width_ratio: f32,
    /// Widest allowed line as a fraction of canvas width.
    pub max_width_ratio: f32,
    /// Box fill (SVG colour, may carry alpha).
    pub box_fill: String,
    /// Text fill.
    pub text_fill: String,
    /// Corner radius of line boxes.
    pub corner_radius: f32,
    /// Font family list.
    pub font_family: String,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 70.0,
            line_height: 80.0,
            padding_x: 10.0,
            padding_y: 10.0,
            char_width_ratio: 0.6,
            max_width_ratio: 0.9,
            box_fill: "#ffffff70".into(),
            text_fill: "#000000".into(),
            corner_radius: 10.0,
            font_family: "Roboto, sans-serif".into(),
        }
    }
}

/// Video assembly settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowConfig {
    /// ffmpeg executable (name on PATH or absolute path).
    pub ffmpeg_path: PathBuf,
    /// Audio track muxed into every video.
    pub audio_path: PathBuf,
    /// How long each still is held.
    pub slide_seconds: u32,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Output frame rate.
    pub fps: u32,
    /// Audio codec for the output.
    pub audio_codec: String,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            audio_path: PathBuf::from("assets/audio.mp3"),
            slide_seconds: 10,
            width: 1024,
            height: 1792,
            fps: 25,
            audio_codec: "aac".into(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct ClipmakerConfig {
    /// Telegram settings.
    pub telegram: TelegramConfig,
    /// Step generator settings.
    pub chat: ChatConfig,
    /// Image generation settings.
    pub image: ImageConfig,
    /// Caption layout.
    pub caption: CaptionStyle,
    /// Video assembly settings.
    pub slideshow: SlideshowConfig,
    /// Where run workspaces are created.
    pub runs_dir: PathBuf,
}

impl ClipmakerConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let telegram = TelegramConfig {
            bot_token: env.required("TELEGRAM_BOT_TOKEN")?,
        };

        let openai_key = env.required("OPENAI_API_KEY")?;
        let openai_base = env
            .get("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".into())
            .trim_end_matches('/')
            .to_string();

        let mut chat = ChatConfig::new(openai_key.clone());
        chat.base_url = openai_base.clone();
        if let Some(model) = env.get("CLIPMAKER_CHAT_MODEL") {
            chat.model = model;
        }
        chat.temperature = env.parsed("CLIPMAKER_TEMPERATURE", chat.temperature)?;
        if let Some(topic) = env.get("CLIPMAKER_TOPIC") {
            chat.topic = topic;
        }
        if let Some(product) = env.get("CLIPMAKER_PRODUCT") {
            chat.product = product;
        }

        let backend_name = env
            .get("CLIPMAKER_IMAGE_BACKEND")
            .unwrap_or_else(|| "replicate".into())
            .to_ascii_lowercase();
        let backend = match backend_name.as_str() {
            "replicate" => ImageBackendConfig::Replicate {
                api_token: env.required("REPLICATE_API_TOKEN")?,
                model: env
                    .get("CLIPMAKER_REPLICATE_MODEL")
                    .unwrap_or_else(|| "black-forest-labs/flux-pro".into()),
                negative_prompt: env
                    .get("CLIPMAKER_NEGATIVE_PROMPT")
                    .unwrap_or_else(|| DEFAULT_NEGATIVE_PROMPT.into()),
                guidance_scale: env.parsed("CLIPMAKER_GUIDANCE_SCALE", 7.5)?,
                num_inference_steps: env.parsed("CLIPMAKER_INFERENCE_STEPS", 50)?,
                aspect_ratio: env
                    .get("CLIPMAKER_ASPECT_RATIO")
                    .unwrap_or_else(|| "9:16".into()),
            },
            "fal" => ImageBackendConfig::Fal {
                api_key: env.required("FAL_KEY")?,
                model: env
                    .get("CLIPMAKER_FAL_MODEL")
                    .unwrap_or_else(|| "fal-ai/flux/dev".into()),
            },
            "openai" => ImageBackendConfig::OpenAi {
                api_key: openai_key,
                base_url: openai_base,
                model: env
                    .get("CLIPMAKER_OPENAI_IMAGE_MODEL")
                    .unwrap_or_else(|| "dall-e-3".into()),
                size: "1024x1792".into(),
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    var: "CLIPMAKER_IMAGE_BACKEND",
                    value: other.to_string(),
                    reason: "expected 'replicate', 'fal' or 'openai'".into(),
                })
            }
        };

        let defaults = RetryPolicy::default();
        let attempts: u32 = env.parsed("CLIPMAKER_RETRY_ATTEMPTS", defaults.max_attempts)?;
        let backoff_ms: u64 = env.parsed(
            "CLIPMAKER_RETRY_BACKOFF_MS",
            defaults.initial_backoff.as_millis() as u64,
        )?;
        let max_backoff_ms: u64 = env.parsed(
            "CLIPMAKER_RETRY_MAX_BACKOFF_MS",
            defaults.max_backoff.as_millis() as u64,
        )?;
        let retry = defaults.with_max_attempts(attempts).with_backoff(
            Duration::from_millis(backoff_ms),
            Duration::from_millis(max_backoff_ms),
        );

        let image = ImageConfig {
            backend,
            prompt_mode: env.parsed("CLIPMAKER_PROMPT_MODE", PromptMode::default())?,
            style_prompt: env
                .get("CLIPMAKER_STYLE_PROMPT")
                .unwrap_or_else(|| DEFAULT_STYLE_PROMPT.into()),
            fetch_timeout: Duration::from_secs(env.parsed("CLIPMAKER_FETCH_TIMEOUT_SECS", 15)?),
            retry,
            on_step_failure: env
                .parsed("CLIPMAKER_ON_STEP_FAILURE", StepFailurePolicy::default())?,
        };

        let mut slideshow = SlideshowConfig::default();
        if let Some(ffmpeg) = env.get("CLIPMAKER_FFMPEG") {
            slideshow.ffmpeg_path = PathBuf::from(ffmpeg);
        }
        if let Some(audio) = env.get("CLIPMAKER_AUDIO_PATH") {
            slideshow.audio_path = PathBuf::from(audio);
        }
        slideshow.slide_seconds = env.parsed("CLIPMAKER_SLIDE_SECONDS", slideshow.slide_seconds)?;
        slideshow.fps = env.parsed("CLIPMAKER_FPS", slideshow.fps)?;
        if slideshow.slide_seconds == 0 || slideshow.fps == 0 {
            return Err(ConfigError::InvalidValue {
                var: "CLIPMAKER_SLIDE_SECONDS",
                value: format!("{}s @ {}fps", slideshow.slide_seconds, slideshow.fps),
                reason: "slide duration and frame rate must be non-zero".into(),
            });
        }

        let runs_dir = env
            .get(RUNS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_runs_dir);

        debug!(
            backend = image.backend.name(),
            model = %chat.model,
            on_step_failure = ?image.on_step_failure,
            "Configuration loaded"
        );

        Ok(Self {
            telegram,
            chat,
            image,
            caption: CaptionStyle::default(),
            slideshow,
            runs_dir,
        })
    }

    /// Check things that can only be verified against the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !self.slideshow.audio_path.is_file() {
            return Err(ConfigError::BadPath {
                path: self.slideshow.audio_path.display().to_string(),
                reason: "audio track not found (set CLIPMAKER_AUDIO_PATH)".into(),
            });
        }
        Ok(())
    }
}

/// Helper around a variable lookup that treats blank values as unset.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String> {
        self.get(key).ok_or(ConfigError::MissingVar(key))
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var: key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
