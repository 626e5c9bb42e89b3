//! Reply helper utilities.
//!
//! Keeps answers in the forum topic the conversation happened in.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, Message, MessageId, ParseMode, ReplyParameters, ThreadId};

use crate::bot::dispatcher::ThrottledBot;

/// Topic the message belongs to, if it was posted inside a forum topic.
///
/// Plain reply chains also carry a thread id; sending with it outside a
/// forum fails, so those are ignored.
pub fn topic_of(msg: &Message) -> Option<ThreadId> {
    if msg.is_topic_message {
        msg.thread_id
    } else {
        None
    }
}

/// Extension trait for easier reply handling.
pub trait ReplyExt {
    /// Get the message ID to reply to for command responses.
    fn reply_target(&self) -> MessageId;

    /// Forum topic to answer in.
    fn topic(&self) -> Option<ThreadId>;

    /// Text of the replied-to message, if any.
    fn replied_text(&self) -> Option<&str>;
}

impl ReplyExt for Message {
    fn reply_target(&self) -> MessageId {
        self.id
    }

    fn topic(&self) -> Option<ThreadId> {
        topic_of(self)
    }

    fn replied_text(&self) -> Option<&str> {
        self.reply_to_message()
            .and_then(|reply| reply.text().or_else(|| reply.caption()))
    }
}

/// Reply to `msg` with an HTML message, in the same topic.
pub async fn reply_html(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> anyhow::Result<()> {
    let mut req = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.reply_target()));
    if let Some(thread) = msg.topic() {
        req = req.message_thread_id(thread);
    }
    if let Some(kb) = keyboard {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}

/// Reply with text that must not be parsed (model output, user input).
pub async fn reply_plain(bot: &ThrottledBot, msg: &Message, text: impl Into<String>) -> anyhow::Result<()> {
    let mut req = bot
        .send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.reply_target()));
    if let Some(thread) = msg.topic() {
        req = req.message_thread_id(thread);
    }
    req.await?;
    Ok(())
}
