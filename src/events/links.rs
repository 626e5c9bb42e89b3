//! Link safety scan for group messages.

use teloxide::types::{Message, MessageEntityKind};
use tracing::{debug, warn};

use crate::bot::dispatcher::ThrottledBot;
use crate::i18n::get_text;
use crate::services::SafeBrowsingClient;
use crate::utils::reply_html;

/// URLs in the message: plain URL entities and hidden text links,
/// deduplicated in order of appearance.
pub fn extract_urls(msg: &Message) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let Some(entities) = msg.parse_entities().or_else(|| msg.parse_caption_entities()) else {
        return urls;
    };

    for entity in entities {
        let url = match entity.kind() {
            MessageEntityKind::Url => entity.text().to_string(),
            MessageEntityKind::TextLink { url } => url.to_string(),
            _ => continue,
        };
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Check `urls` and reply with a warning if any are flagged. Scan failures
/// are logged and the message is left alone.
pub async fn scan_and_warn(
    bot: &ThrottledBot,
    msg: &Message,
    client: &SafeBrowsingClient,
    urls: Vec<String>,
    locale: &str,
) -> anyhow::Result<()> {
    let flagged = match client.find_threats(&urls).await {
        Ok(flagged) => flagged,
        Err(e) => {
            warn!("Safe Browsing check failed for chat {}: {}", msg.chat.id, e);
            return Ok(());
        }
    };

    if flagged.is_empty() {
        debug!("{} link(s) in chat {} look clean", urls.len(), msg.chat.id);
        return Ok(());
    }

    warn!(
        chat_id = msg.chat.id.0,
        message_id = msg.id.0,
        flagged = ?flagged,
        "dangerous links detected"
    );
    reply_html(bot, msg, get_text(locale, "links.warning"), None).await
}
