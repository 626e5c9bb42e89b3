//! Join request handler.
//!
//! Settles the request through [`JoinFlow`](crate::router::JoinFlow), then
//! sends the best-effort notifications: a DM to the user and a greeting in
//! the group.

use teloxide::prelude::*;
use teloxide::types::{ChatJoinRequest, ParseMode};
use tracing::{debug, info, warn};

use super::welcome::{greeting, rules_keyboard};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::router::{self, ChatEvent, EventKind, JoinOutcome, Route};
use crate::services::ApprovalError;
use crate::utils::minutes_ceil;

pub async fn handler(bot: ThrottledBot, request: ChatJoinRequest, state: AppState) -> anyhow::Result<()> {
    let chat_id = request.chat.id;
    let user = &request.from;
    let user_chat = ChatId::from(user.id);
    let locale = state.locale();

    let event = ChatEvent {
        kind: EventKind::JoinRequest,
        user_id: user.id.0,
        chat_id: chat_id.0,
        text: None,
        thread_id: None,
    };
    if router::route(&event, &state.policy) != Route::Join {
        return Ok(());
    }

    match state.joins.handle(chat_id.0, user.id.0).await {
        JoinOutcome::Approved => {
            // Marked before sending so the "user joined" service message is not greeted twice.
            state.recent_welcomes.insert((chat_id.0, user.id.0), ());

            if let Err(e) = bot.send_message(user_chat, get_text(locale, "join.approved_dm")).await {
                // Users who never opened the bot cannot be messaged first.
                info!("Could not DM approved user {}: {}", user.id, e);
            }

            if let Err(e) = bot
                .send_message(chat_id, greeting(locale, user))
                .parse_mode(ParseMode::Html)
                .reply_markup(rules_keyboard(locale))
                .await
            {
                warn!("Failed to greet {} in chat {}: {}", user.id, chat_id, e);
            }
        }
        JoinOutcome::Throttled { declined } => {
            if declined && state.config.join_notify_declined {
                let minutes = minutes_ceil(state.config.join_window.as_secs());
                let text = get_text(locale, "join.declined_dm").replace("{minutes}", &minutes.to_string());
                if let Err(e) = bot.send_message(user_chat, text).await {
                    debug!("Could not DM declined user {}: {}", user.id, e);
                }
            }
        }
        JoinOutcome::ApprovalFailed(ApprovalError::AlreadyHandled) => {
            debug!("Join request from {} in {} was already handled", user.id, chat_id);
        }
        JoinOutcome::ApprovalFailed(_) => {}
    }

    Ok(())
}
