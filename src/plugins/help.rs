//! /help command plugin.

use teloxide::prelude::*;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{html_escape, reply_html};

/// Handle /help command.
pub async fn help_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let text = get_text(state.locale(), "help.text")
        .replace("{keyword}", &html_escape(&state.config.trigger_keyword));
    reply_html(&bot, &msg, text, None).await
}
