//! Mini-app data handler.
//!
//! The mini-app sends either a reminder request as JSON or a `key|payload`
//! string for drafts and notes. Reminders live in memory only and are lost
//! on restart.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use teloxide::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{html_escape, reply_html, topic_of};

pub const MAX_PENDING_PER_USER: usize = 20;
pub const MIN_REMINDER_DELAY: Duration = Duration::from_secs(1);
pub const MAX_REMINDER_DELAY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("unrecognized payload")]
    Unknown,

    #[error("reminder text is empty")]
    EmptyText,

    #[error("reminder needs delay_seconds or at")]
    MissingTime,

    #[error("delay must be between 1 second and 7 days")]
    DelayOutOfRange,
}

impl PayloadError {
    /// Errors that mean "not ours to parse" rather than a bad reminder.
    fn is_unrecognized(&self) -> bool {
        matches!(self, PayloadError::Json(_) | PayloadError::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebAppPayload {
    Reminder {
        text: String,
        delay: Duration,
        due: DateTime<Utc>,
    },
    Draft(String),
    Note(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonPayload {
    Reminder {
        #[serde(default)]
        text: String,
        delay_seconds: Option<i64>,
        at: Option<DateTime<FixedOffset>>,
    },
}

/// Parse raw `web_app_data`. `now` anchors absolute reminder times.
pub fn parse_payload(raw: &str, now: DateTime<Utc>) -> Result<WebAppPayload, PayloadError> {
    let raw = raw.trim();

    if raw.starts_with('{') {
        let parsed: JsonPayload = serde_json::from_str(raw).map_err(|e| PayloadError::Json(e.to_string()))?;
        return match parsed {
            JsonPayload::Reminder { text, delay_seconds, at } => reminder(text, delay_seconds, at, now),
        };
    }

    let (key, payload) = raw.split_once('|').ok_or(PayloadError::Unknown)?;
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(PayloadError::Unknown);
    }
    match key.trim() {
        "draft" => Ok(WebAppPayload::Draft(payload.to_string())),
        "note" => Ok(WebAppPayload::Note(payload.to_string())),
        _ => Err(PayloadError::Unknown),
    }
}

fn reminder(
    text: String,
    delay_seconds: Option<i64>,
    at: Option<DateTime<FixedOffset>>,
    now: DateTime<Utc>,
) -> Result<WebAppPayload, PayloadError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(PayloadError::EmptyText);
    }

    let seconds = match (delay_seconds, at) {
        (Some(secs), _) => secs,
        (None, Some(at)) => (at.with_timezone(&Utc) - now).num_seconds(),
        (None, None) => return Err(PayloadError::MissingTime),
    };

    let delay = u64::try_from(seconds)
        .map(Duration::from_secs)
        .map_err(|_| PayloadError::DelayOutOfRange)?;
    if !(MIN_REMINDER_DELAY..=MAX_REMINDER_DELAY).contains(&delay) {
        return Err(PayloadError::DelayOutOfRange);
    }

    let due = now + chrono::Duration::seconds(seconds);
    Ok(WebAppPayload::Reminder { text, delay, due })
}

/// Pending reminders per user, bounded by [`MAX_PENDING_PER_USER`].
#[derive(Clone, Default)]
pub struct ReminderScheduler {
    pending: Arc<DashMap<u64, usize>>,
}

impl ReminderScheduler {
    /// Reminders not yet delivered for `user_id`.
    pub fn pending(&self, user_id: u64) -> usize {
        self.pending.get(&user_id).map(|count| *count).unwrap_or(0)
    }

    fn try_reserve(&self, user_id: u64) -> bool {
        let mut count = self.pending.entry(user_id).or_insert(0);
        if *count >= MAX_PENDING_PER_USER {
            return false;
        }
        *count += 1;
        true
    }

    fn release(&self, user_id: u64) {
        if let Some(mut count) = self.pending.get_mut(&user_id) {
            *count = count.saturating_sub(1);
        }
        self.pending.remove_if(&user_id, |_, count| *count == 0);
    }

    /// Run `deliver` after `delay`. Returns `false` when the user already
    /// has the maximum number of pending reminders.
    pub fn schedule<F>(&self, user_id: u64, delay: Duration, deliver: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.try_reserve(user_id) {
            return false;
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            deliver.await;
            scheduler.release(user_id);
        });
        true
    }
}

/// Handle a `web_app_data` service message.
pub async fn web_app_data_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let (Some(data), Some(user)) = (msg.web_app_data(), msg.from.as_ref()) else {
        return Ok(());
    };
    let locale = state.locale();

    let payload = match parse_payload(&data.data, Utc::now()) {
        Ok(payload) => payload,
        Err(e) if e.is_unrecognized() => {
            debug!("Unrecognized mini-app data from {}: {}", user.id, e);
            return reply_html(&bot, &msg, get_text(locale, "webapp.unknown"), None).await;
        }
        Err(e) => {
            let text = get_text(locale, "webapp.reminder_invalid").replace("{reason}", &html_escape(&e.to_string()));
            return reply_html(&bot, &msg, text, None).await;
        }
    };

    match payload {
        WebAppPayload::Reminder { text, delay, due } => {
            let deliver = {
                let bot = bot.clone();
                let chat_id = msg.chat.id;
                let thread = topic_of(&msg);
                let body = get_text(locale, "webapp.reminder_fired").replace("{text}", &text);
                async move {
                    let mut request = bot.send_message(chat_id, body);
                    if let Some(thread) = thread {
                        request = request.message_thread_id(thread);
                    }
                    if let Err(e) = request.await {
                        warn!("Failed to deliver reminder to {}: {}", chat_id, e);
                    }
                }
            };

            if !state.reminders.schedule(user.id.0, delay, deliver) {
                let text = get_text(locale, "webapp.reminder_limit")
                    .replace("{max}", &MAX_PENDING_PER_USER.to_string());
                return reply_html(&bot, &msg, text, None).await;
            }

            info!(user_id = user.id.0, delay_secs = delay.as_secs(), "reminder scheduled");
            let text = get_text(locale, "webapp.reminder_set")
                .replace("{time}", &due.format("%Y-%m-%d %H:%M UTC").to_string());
            reply_html(&bot, &msg, text, None).await
        }
        WebAppPayload::Draft(payload) => {
            let text = get_text(locale, "webapp.draft").replace("{payload}", &html_escape(&payload));
            reply_html(&bot, &msg, text, None).await
        }
        WebAppPayload::Note(payload) => {
            let text = get_text(locale, "webapp.note").replace("{payload}", &html_escape(&payload));
            reply_html(&bot, &msg, text, None).await
        }
    }
}
