//! Welcome event handler.
//!
//! Greets members announced by a "user joined" service message.

use futures::future::join_all;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, User};
use tracing::{debug, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::plugins::RULES_CALLBACK;
use crate::utils::{mention_html, reply_html};

/// Keyboard with the single "rules" button.
pub fn rules_keyboard(locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        get_text(locale, "rules.button"),
        RULES_CALLBACK,
    )]])
}

pub fn greeting(locale: &str, user: &User) -> String {
    get_text(locale, "welcome.greeting").replace("{mention}", &mention_html(user))
}

/// Members that still need a greeting: no bots, nobody the join flow just
/// welcomed.
fn members_to_greet<'a>(msg: &'a Message, state: &AppState) -> Vec<&'a User> {
    let chat_id = msg.chat.id.0;
    msg.new_chat_members()
        .unwrap_or_default()
        .iter()
        .filter(|user| !user.is_bot)
        .filter(|user| !state.recent_welcomes.contains(&(chat_id, user.id.0)))
        .collect()
}

/// Handle a new-members service message.
pub async fn handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let members = members_to_greet(&msg, &state);
    if members.is_empty() {
        debug!("No members to greet in chat {}", msg.chat.id);
        return Ok(());
    }

    let locale = state.locale();
    let greetings = members.iter().map(|user| {
        reply_html(&bot, &msg, greeting(locale, user), Some(rules_keyboard(locale)))
    });

    for (user, result) in members.iter().zip(join_all(greetings).await) {
        if let Err(e) = result {
            warn!("Failed to greet {} in chat {}: {}", user.id, msg.chat.id, e);
        }
    }

    Ok(())
}
