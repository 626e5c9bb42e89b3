//! /drafts command plugin.
//!
//! Opens the mini-app. Web app buttons only work in private chats.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::reply_html;

fn drafts_keyboard(locale: &str, url: Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
        get_text(locale, "drafts.button"),
        WebAppInfo { url },
    )]])
}

/// Handle the /drafts command.
pub async fn drafts_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let locale = state.locale();

    if !msg.chat.is_private() {
        return reply_html(&bot, &msg, get_text(locale, "drafts.private_only"), None).await;
    }

    let Some(url) = state.config.webapp_url.clone() else {
        return reply_html(&bot, &msg, get_text(locale, "drafts.not_configured"), None).await;
    };

    reply_html(&bot, &msg, get_text(locale, "drafts.prompt"), Some(drafts_keyboard(locale, url))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_has_single_web_app_button() {
        let url = Url::parse("https://example.org/app").unwrap();
        let keyboard = drafts_keyboard("uk", url);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, get_text("uk", "drafts.button"));
    }
}
