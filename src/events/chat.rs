//! AI chat relay handler.
//!
//! Turns a [`RelayOutcome`] into a Telegram reply.

use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{debug, warn};
use url::Url;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::gate::{DecisionReason, LookupFailure};
use crate::i18n::get_text;
use crate::router::{ChatEvent, EventKind, RelayOutcome};
use crate::services::CompletionError;
use crate::utils::{MAX_MESSAGE_CHARS, ReplyExt, reply_html, reply_plain, split_message};

pub async fn relay_message(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    event: &ChatEvent,
    check_subscription: bool,
) -> anyhow::Result<()> {
    if state.relay.is_available() {
        let mut typing = bot.send_chat_action(msg.chat.id, ChatAction::Typing);
        if let Some(thread) = msg.topic() {
            typing = typing.message_thread_id(thread);
        }
        if let Err(e) = typing.await {
            debug!("Failed to send typing action: {}", e);
        }
    }

    let outcome = state.relay.handle(event, check_subscription).await;
    let locale = state.locale();

    match outcome {
        RelayOutcome::Reply(text) => {
            for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
                reply_plain(bot, msg, chunk).await?;
            }
        }
        RelayOutcome::Wait { remaining_secs } => {
            let text = get_text(locale, "ai.wait").replace("{seconds}", &remaining_secs.to_string());
            reply_html(bot, msg, text, None).await?;
        }
        RelayOutcome::Denied(decision) => match decision.reason {
            DecisionReason::Ok => {}
            DecisionReason::NotMember => {
                let keyboard = invite_keyboard(&state.config.invite_button_text, &state.config.invite_link);
                reply_html(bot, msg, get_text(locale, "ai.not_member"), keyboard).await?;
            }
            reason => {
                reply_html(bot, msg, get_text(locale, denial_key(reason)), None).await?;
            }
        },
        RelayOutcome::Failed(err) => {
            reply_html(bot, msg, get_text(locale, failure_key(&err)), None).await?;
        }
        RelayOutcome::Unavailable => {
            // Silence in groups: every trigger word would get the same notice.
            if event.kind == EventKind::PrivateMessage {
                reply_html(bot, msg, get_text(locale, "ai.unavailable"), None).await?;
            }
        }
    }

    Ok(())
}

/// Call-to-action button pointing at the forum invite.
fn invite_keyboard(button_text: &str, invite_link: &str) -> Option<InlineKeyboardMarkup> {
    match Url::parse(invite_link) {
        Ok(url) => Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
            button_text.to_string(),
            url,
        )]])),
        Err(e) => {
            warn!("Invalid FORUM_INVITE_LINK {}: {}", invite_link, e);
            None
        }
    }
}

fn denial_key(reason: DecisionReason) -> &'static str {
    match reason {
        DecisionReason::Ok | DecisionReason::NotMember => "ai.not_member",
        DecisionReason::LookupFailed(LookupFailure::Permission) => "ai.permission",
        DecisionReason::LookupFailed(LookupFailure::Timeout) => "ai.lookup_timeout",
        DecisionReason::LookupFailed(LookupFailure::Transient) => "ai.lookup_failed",
        DecisionReason::Misconfigured => "ai.misconfigured",
    }
}

fn failure_key(err: &CompletionError) -> &'static str {
    match err {
        CompletionError::RateLimited => "ai.rate_limited",
        CompletionError::Timeout(_) => "ai.timeout",
        CompletionError::AuthFailed(_) => "ai.unavailable",
        CompletionError::EmptyResponse | CompletionError::Unknown(_) => "ai.failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_failure_has_its_own_message() {
        let keys = [
            denial_key(DecisionReason::LookupFailed(LookupFailure::Permission)),
            denial_key(DecisionReason::LookupFailed(LookupFailure::Timeout)),
            denial_key(DecisionReason::LookupFailed(LookupFailure::Transient)),
            denial_key(DecisionReason::Misconfigured),
            denial_key(DecisionReason::NotMember),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_messages_exist_for_all_keys() {
        let keys = [
            denial_key(DecisionReason::LookupFailed(LookupFailure::Permission)),
            denial_key(DecisionReason::Misconfigured),
            failure_key(&CompletionError::RateLimited),
            failure_key(&CompletionError::Timeout(std::time::Duration::from_secs(1))),
            failure_key(&CompletionError::EmptyResponse),
        ];
        for key in keys {
            assert_ne!(get_text("uk", key), key);
        }
    }

    #[test]
    fn test_invite_keyboard_requires_valid_url() {
        assert!(invite_keyboard("forum", "https://t.me/+abc").is_some());
        assert!(invite_keyboard("forum", "not a url").is_none());
    }
}
