//! Sending stills and the video back to the chat.

use async_trait::async_trait;
use clipmaker_core::{CaptionedImage, SlideshowOutput};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, InputMedia, InputMediaPhoto};
use tracing::info;

use crate::error::Result;

/// Caption attached to the slideshow video.
pub const VIDEO_CAPTION: &str = "Video meditation";

/// Telegram accepts 2 to 10 items per media group.
pub const MEDIA_GROUP_MAX: usize = 10;

/// Telegram's limit for photo and video captions, in characters.
pub const CAPTION_MAX_CHARS: usize = 1024;

/// Where finished media goes.
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Send the stills, in order.
    async fn send_stills(&self, images: &[CaptionedImage]) -> Result<()>;

    /// Send the slideshow.
    async fn send_video(&self, video: &SlideshowOutput) -> Result<()>;
}

/// One outgoing message worth of stills.
#[derive(Debug, PartialEq, Eq)]
pub enum Batch<'a> {
    /// Sent as a plain photo.
    Single(&'a CaptionedImage),
    /// Sent as a media group.
    Group(&'a [CaptionedImage]),
}

/// Split stills into messages that satisfy the media group limits.
pub fn plan_batches(images: &[CaptionedImage]) -> Vec<Batch<'_>> {
    images
        .chunks(MEDIA_GROUP_MAX)
        .map(|chunk| match chunk {
            [single] => Batch::Single(single),
            group => Batch::Group(group),
        })
        .collect()
}

/// Cut a caption to Telegram's limit.
pub fn truncate_caption(text: &str) -> String {
    if text.chars().count() <= CAPTION_MAX_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(CAPTION_MAX_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Delivers to a Telegram chat.
pub struct TelegramDelivery {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Deliverer for TelegramDelivery {
    async fn send_stills(&self, images: &[CaptionedImage]) -> Result<()> {
        let _ = self
            .bot
            .send_chat_action(self.chat_id, ChatAction::UploadPhoto)
            .await;

        for batch in plan_batches(images) {
            match batch {
                Batch::Single(image) => {
                    self.bot
                        .send_photo(self.chat_id, InputFile::file(&image.path))
                        .caption(truncate_caption(&image.caption))
                        .await?;
                }
                Batch::Group(group) => {
                    let media = group.iter().map(|image| {
                        InputMedia::Photo(
                            InputMediaPhoto::new(InputFile::file(&image.path))
                                .caption(truncate_caption(&image.caption)),
                        )
                    });
                    self.bot.send_media_group(self.chat_id, media).await?;
                }
            }
        }

        info!(chat_id = %self.chat_id, stills = images.len(), "Stills delivered");
        Ok(())
    }

    async fn send_video(&self, video: &SlideshowOutput) -> Result<()> {
        let _ = self
            .bot
            .send_chat_action(self.chat_id, ChatAction::UploadVideo)
            .await;

        self.bot
            .send_video(self.chat_id, InputFile::file(&video.path))
            .caption(VIDEO_CAPTION)
            .await?;

        info!(chat_id = %self.chat_id, "Video delivered");
        Ok(())
    }
}
