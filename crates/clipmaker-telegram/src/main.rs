//! Clipmaker Telegram Bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx OPENAI_API_KEY=xxx REPLICATE_API_TOKEN=xxx \
//!     cargo run -p clipmaker-telegram
//! ```

use std::path::PathBuf;

use clap::Parser;
use clipmaker_core::{config, ClipmakerConfig};
use clipmaker_telegram::ClipmakerBot;
use tracing_subscriber::EnvFilter;

/// Clipmaker Telegram Bot - generated meditation stills and slideshows
#[derive(Parser, Debug)]
#[command(name = "clipmaker-telegram")]
#[command(about = "Telegram bot that turns generated narration into captioned stills and a video")]
struct Args {
    /// Audio track for the slideshow (overrides CLIPMAKER_AUDIO_PATH)
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// Directory for per-run scratch files (overrides CLIPMAKER_RUNS_DIR)
    #[arg(long)]
    runs_dir: Option<PathBuf>,

    /// Validate configuration and ffmpeg, then exit
    #[arg(long)]
    check: bool,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    config::load_env_files();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "clipmaker_telegram=info,clipmaker_agent=info,clipmaker_media=info,clipmaker_core=info,teloxide=warn",
        1 => "clipmaker_telegram=debug,clipmaker_agent=debug,clipmaker_media=debug,clipmaker_core=debug,teloxide=info",
        2 => "clipmaker_telegram=trace,clipmaker_agent=trace,clipmaker_media=trace,clipmaker_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let mut cfg = ClipmakerConfig::from_env()?;
    if let Some(audio) = args.audio {
        cfg.slideshow.audio_path = audio;
    }
    if let Some(runs_dir) = args.runs_dir {
        cfg.runs_dir = runs_dir;
    }
    cfg.validate()?;

    let bot = ClipmakerBot::new(&cfg)?;
    let ffmpeg = bot.state().pipeline().check_encoder()?;
    tracing::info!(ffmpeg = %ffmpeg.display(), "Encoder found");

    if args.check {
        println!("Configuration OK");
        println!("   Image backend: {}", cfg.image.backend.name());
        println!("   Chat model: {}", cfg.chat.model);
        println!("   Audio: {}", cfg.slideshow.audio_path.display());
        println!("   ffmpeg: {}", ffmpeg.display());
        return Ok(());
    }

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] Clipmaker Telegram Bot");
            println!("   Bot: @{}", username);
            println!("   Image backend: {}", cfg.image.backend.name());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /clipmaker to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
