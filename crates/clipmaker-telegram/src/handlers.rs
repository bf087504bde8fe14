//! Command handlers for the Telegram bot.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::delivery::TelegramDelivery;
use crate::observer::ChatActionObserver;
use crate::pipeline::{RunMode, RunObservers};
use crate::state::BotState;

/// Reply sent when a run fails for any reason.
pub const APOLOGY: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";

/// Reply sent when the chat already has a run in progress.
pub const BUSY: &str =
    "I'm still working on your previous request. Please wait for it to finish.";

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Say hello")]
    Hello,

    #[command(description = "Create a narrated video meditation with captioned stills")]
    Clipmaker,

    #[command(description = "Create captioned meditation stills only")]
    Nad,

    #[command(description = "Show whether a request is in progress")]
    Status,
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    let welcome = "Welcome to Clipmaker! 🧘\n\n\
        I write a short guided meditation, illustrate every step and cut it into a video.\n\n\
        <b>Commands:</b>\n\
        /clipmaker - stills and a video meditation\n\
        /nad - captioned stills only\n\
        /status - check on your request\n\n\
        Type /help for all commands.";

    bot.send_message(msg.chat.id, welcome)
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;

    info!(chat_id = %msg.chat.id, user = ?msg.from.as_ref().map(|u| &u.username), "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// Handle the /hello command.
pub async fn handle_hello(bot: Bot, msg: Message) -> ResponseResult<()> {
    let name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "there".to_string());
    bot.send_message(msg.chat.id, format!("Hello, {}! 👋", name))
        .await?;
    Ok(())
}

/// Handle the /status command.
pub async fn handle_status(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let text = if state.is_running(msg.chat.id.0).await {
        "A request is in progress in this chat."
    } else {
        "Nothing in progress. Send /clipmaker to start."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Run the pipeline for /clipmaker and /nad.
///
/// Pipeline errors never reach the dispatcher: they are logged and answered
/// with [`APOLOGY`].
pub async fn handle_run(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    mode: RunMode,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;

    if let Err(e) = state.begin_run(chat_id.0).await {
        info!(chat_id = %chat_id, reason = %e, "Rejected request");
        bot.send_message(chat_id, BUSY).await?;
        return Ok(());
    }

    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        info!(chat_id = %chat_id, error = %e, "Failed to send typing action");
    }

    let delivery = TelegramDelivery::new(bot.clone(), chat_id);
    let observer = ChatActionObserver::new(bot.clone(), chat_id);
    let observers = RunObservers {
        steps: Some(&observer),
        encoding: Some(&observer),
    };

    let result = state
        .pipeline()
        .run(chat_id.0, mode, &delivery, observers)
        .await;
    state.finish_run(chat_id.0).await;

    match result {
        Ok(report) => {
            info!(
                chat_id = %chat_id,
                run_id = %report.run_id,
                activity = %report.activity,
                stills = report.stills,
                "Request completed"
            );
        }
        Err(e) => {
            error!(chat_id = %chat_id, error = %e, "Request failed");
            bot.send_message(chat_id, APOLOGY).await?;
        }
    }
    Ok(())
}

/// Dispatch a parsed command.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Hello => handle_hello(bot, msg).await,
        Command::Clipmaker => handle_run(bot, msg, state, RunMode::StillsAndVideo).await,
        Command::Nad => handle_run(bot, msg, state, RunMode::Stills).await,
        Command::Status => handle_status(bot, msg, state).await,
    }
}
