//! Main Telegram bot implementation.

use std::sync::Arc;

use clipmaker_core::ClipmakerConfig;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::handlers::{handle_command, Command};
use crate::pipeline::ClipPipeline;
use crate::state::{create_shared_state, BotState};

/// The Clipmaker Telegram bot.
pub struct ClipmakerBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BotState>,
}

impl ClipmakerBot {
    /// Create the bot and its pipeline from configuration.
    pub fn new(config: &ClipmakerConfig) -> Result<Self> {
        let pipeline = ClipPipeline::from_config(config)?;
        Ok(Self::with_pipeline(&config.telegram.bot_token, pipeline))
    }

    /// Create the bot around an existing pipeline.
    pub fn with_pipeline(token: &str, pipeline: ClipPipeline) -> Self {
        Self {
            bot: Bot::new(token),
            state: create_shared_state(pipeline),
        }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| PipelineError::StartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Start the bot in long-polling mode. Returns on Ctrl+C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register command menu");
        }

        let bot = self.bot.clone();
        let state_for_commands = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        info!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                        async move { handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| t.starts_with('/')))
                    .endpoint(|bot: Bot, msg: Message| async move {
                        if let Some(text) = msg.text() {
                            info!(cmd = %text, "Unrecognized command - sending response");
                            bot.send_message(
                                msg.chat.id,
                                format!(
                                    "Unknown command: {}\n\nUse /help to see available commands.",
                                    text.split_whitespace().next().unwrap_or(text)
                                ),
                            )
                            .await?;
                        }
                        Ok(())
                    }),
            )
            .branch(
                Update::filter_message().endpoint(|bot: Bot, msg: Message| async move {
                    bot.send_message(
                        msg.chat.id,
                        "Send /clipmaker for a video meditation or /help for all commands.",
                    )
                    .await?;
                    Ok(())
                }),
            );

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(bot, handler)
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!(active_runs = self.state.active_count().await, "Bot stopped");
        Ok(())
    }
}
