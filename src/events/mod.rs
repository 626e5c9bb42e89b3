//! Event handler system.
//!
//! - `welcome` - greets members from "user joined" service messages
//! - `join_request` - runs join requests through the admission flow
//! - `chat` - relays routed messages to the AI backend
//! - `links` - Safe Browsing scan of group links

pub mod chat;
pub mod join_request;
pub mod links;
pub mod welcome;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ThreadId};
use tracing::{debug, error};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::plugins::webapp;
use crate::router::{self, ChatEvent, EventKind, Route};
use crate::utils::topic_of;

/// Build the message event handler.
pub fn message_event_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(dptree::filter(|msg: Message| msg.new_chat_members().is_some()).endpoint(welcome::handler))
        .branch(dptree::filter(|msg: Message| msg.web_app_data().is_some()).endpoint(webapp::web_app_data_handler))
        .branch(dptree::endpoint(unified_message_handler))
}

/// Read-only routing view of a chat message. `None` for channels and
/// messages without a sender.
pub fn chat_event(msg: &Message) -> Option<ChatEvent> {
    let user = msg.from.as_ref()?;
    let kind = if msg.chat.is_private() {
        EventKind::PrivateMessage
    } else if msg.chat.is_group() || msg.chat.is_supergroup() {
        EventKind::GroupMessage
    } else {
        return None;
    };

    Some(ChatEvent {
        kind,
        user_id: user.id.0,
        chat_id: msg.chat.id.0,
        text: msg.text().map(str::to_string),
        thread_id: topic_of(msg).map(|ThreadId(MessageId(id))| id),
    })
}

/// Runs the link scan for group messages, then routes the message.
async fn unified_message_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(event) = chat_event(&msg) else {
        return Ok(());
    };

    // The scan is advisory; it must not hold up the reply.
    if event.kind == EventKind::GroupMessage
        && let Some(client) = state.links.clone()
    {
        let urls = links::extract_urls(&msg);
        if !urls.is_empty() {
            let bot = bot.clone();
            let msg = msg.clone();
            let locale = state.locale().to_string();
            tokio::spawn(async move {
                if let Err(e) = links::scan_and_warn(&bot, &msg, &client, urls, &locale).await {
                    error!("Link scan reply failed: {}", e);
                }
            });
        }
    }

    match router::route(&event, &state.policy) {
        Route::AiChat { check_subscription } => {
            chat::relay_message(&bot, &msg, &state, &event, check_subscription).await
        }
        Route::Join | Route::Ignore => {
            debug!(chat_id = event.chat_id, kind = ?event.kind, "message not routed");
            Ok(())
        }
    }
}
