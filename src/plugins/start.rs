//! /start command plugin.

use teloxide::prelude::*;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{html_escape, reply_html};

/// Handle the /start command.
pub async fn start_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let text = get_text(state.locale(), "start.text")
        .replace("{keyword}", &html_escape(&state.config.trigger_keyword));
    reply_html(&bot, &msg, text, None).await
}
