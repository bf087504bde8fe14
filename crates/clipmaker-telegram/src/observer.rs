//! Chat action heartbeat while a run is working.
//!
//! Telegram clears a chat action after about five seconds, so long stages
//! re-send it. Sends are fire-and-forget and throttled.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use clipmaker_core::NarrationStep;
use clipmaker_media::ProgressObserver;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{debug, trace};

use crate::imageset::StepObserver;

/// Minimum gap between two chat actions.
const ACTION_INTERVAL: Duration = Duration::from_secs(4);

/// Shows "uploading photo" while stills render and "uploading video" while encoding.
pub struct ChatActionObserver {
    bot: Bot,
    chat_id: ChatId,
    last_sent: Mutex<Option<Instant>>,
}

impl ChatActionObserver {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            last_sent: Mutex::new(None),
        }
    }

    fn due(&self) -> bool {
        let Ok(mut last) = self.last_sent.lock() else {
            return false;
        };
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < ACTION_INTERVAL => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn send(&self, action: ChatAction) {
        if !self.due() {
            return;
        }
        let bot = self.bot.clone();
        let chat_id = self.chat_id;
        tokio::spawn(async move {
            if let Err(e) = bot.send_chat_action(chat_id, action).await {
                trace!(chat_id = %chat_id, error = %e, "Chat action failed");
            }
        });
    }
}

impl StepObserver for ChatActionObserver {
    fn on_step_started(&self, index: usize, total: usize, step: &NarrationStep) {
        debug!(chat_id = %self.chat_id, step = index, total, label = %step.label, "Rendering step");
        self.send(ChatAction::UploadPhoto);
    }
}

impl ProgressObserver for ChatActionObserver {
    fn on_progress(&self, out_time: Duration) {
        trace!(chat_id = %self.chat_id, out_time_ms = out_time.as_millis() as u64, "Encoding");
        self.send(ChatAction::UploadVideo);
    }
}
