//! Telegram bot for Clipmaker.
//!
//! The bot asks a language model for a short guided activity, illustrates every
//! step with a generated image, burns the step text into it, and sends the stills
//! followed by a crossfade slideshow set to music.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `OPENAI_API_KEY`: Chat completion API key
//! - `REPLICATE_API_TOKEN` or `FAL_KEY`: depending on `CLIPMAKER_IMAGE_BACKEND`
//!
//! See `clipmaker_core::config` for the optional settings.
//!
//! # Example
//!
//! ```no_run
//! use clipmaker_core::ClipmakerConfig;
//! use clipmaker_telegram::ClipmakerBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClipmakerConfig::from_env()?;
//!     config.validate()?;
//!     let bot = ClipmakerBot::new(&config)?;
//!     bot.start_polling().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/start`, `/help` - Welcome message and command list
//! - `/hello` - Greeting
//! - `/clipmaker` - Captioned stills and the slideshow video
//! - `/nad` - Captioned stills only
//! - `/status` - Whether a request is in progress in this chat

pub mod bot;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod imageset;
pub mod observer;
pub mod pipeline;
pub mod state;

pub use bot::ClipmakerBot;
pub use delivery::{Deliverer, TelegramDelivery};
pub use error::{PipelineError, Result, StepError};
pub use imageset::{build_prompt, Composer, ImageSetGenerator, StepObserver};
pub use pipeline::{ClipPipeline, RunMode, RunObservers, RunReport};
pub use state::{create_shared_state, BotState};
