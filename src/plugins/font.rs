//! /font command plugin.

use teloxide::prelude::*;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::font::stylize;
use crate::utils::{ReplyExt, html_escape, reply_html};

/// Text to restyle: the command argument, else the replied-to message.
fn source_text<'a>(args: &'a str, msg: &'a Message) -> Option<&'a str> {
    let args = args.trim();
    if !args.is_empty() {
        return Some(args);
    }
    msg.replied_text().map(str::trim).filter(|t| !t.is_empty())
}

/// Handle the /font command.
pub async fn font_command(bot: ThrottledBot, msg: Message, state: AppState, text: String) -> anyhow::Result<()> {
    let reply = match source_text(&text, &msg) {
        Some(source) => html_escape(&stylize(source)),
        None => get_text(state.locale(), "font.usage"),
    };
    reply_html(&bot, &msg, reply, None).await
}
