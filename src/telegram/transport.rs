//! Outbound side of the bot.
//!
//! Everything that talks back to Telegram goes through [`Transport`], so the
//! dispatch front and the approval coordinator can be exercised in tests with
//! a recording double instead of a live bot.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, FileId, InputFile, MessageId, ParseMode};

use crate::conversation::reply::Markup;
use crate::core::error::AppResult;
use crate::storage::payments::CardRef;
use crate::telegram::keyboards;
use crate::telegram::Bot;

/// A message the bot sent or received.
pub type MessageRef = CardRef;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, markup: &Markup) -> AppResult<MessageRef>;

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        markup: &Markup,
    ) -> AppResult<MessageRef>;

    async fn send_audio(&self, chat_id: i64, file_id: &str, caption: Option<&str>) -> AppResult<MessageRef>;

    async fn edit_message_text(&self, message: MessageRef, text: &str, markup: &Markup) -> AppResult<()>;

    /// Replaces the caption and drops any inline keyboard.
    async fn edit_message_caption(&self, message: MessageRef, caption: &str) -> AppResult<()>;

    async fn delete_message(&self, message: MessageRef) -> AppResult<()>;

    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> AppResult<()>;
}

/// [`Transport`] backed by the Bot API. All text is sent as HTML and catalog
/// content is protected from forwarding and saving.
#[derive(Clone)]
pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn sent(chat_id: i64, msg: Message) -> MessageRef {
    MessageRef {
        chat_id,
        message_id: msg.id.0,
    }
}

#[async_trait]
impl Transport for TeloxideTransport {
    async fn send_text(&self, chat_id: i64, text: &str, markup: &Markup) -> AppResult<MessageRef> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .protect_content(true);
        if let Some(markup) = keyboards::reply_markup(markup) {
            request = request.reply_markup(markup);
        }
        Ok(sent(chat_id, request.await?))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
        markup: &Markup,
    ) -> AppResult<MessageRef> {
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_owned())))
            .parse_mode(ParseMode::Html)
            .protect_content(true);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        if let Some(markup) = keyboards::reply_markup(markup) {
            request = request.reply_markup(markup);
        }
        Ok(sent(chat_id, request.await?))
    }

    async fn send_audio(&self, chat_id: i64, file_id: &str, caption: Option<&str>) -> AppResult<MessageRef> {
        let mut request = self
            .bot
            .send_audio(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_owned())))
            .parse_mode(ParseMode::Html)
            .protect_content(true);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        Ok(sent(chat_id, request.await?))
    }

    async fn edit_message_text(&self, message: MessageRef, text: &str, markup: &Markup) -> AppResult<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = keyboards::edit_markup(markup) {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }

    async fn edit_message_caption(&self, message: MessageRef, caption: &str) -> AppResult<()> {
        self.bot
            .edit_message_caption(ChatId(message.chat_id), MessageId(message.message_id))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> AppResult<()> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> AppResult<()> {
        let mut request = self.bot.answer_callback_query(CallbackQueryId(callback_id.to_owned()));
        if let Some(text) = alert {
            request = request.text(text).show_alert(true);
        }
        request.await?;
        Ok(())
    }
}
