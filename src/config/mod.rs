//! Configuration module for the bot.
//!
//! Loads configuration from environment variables (a `.env` file is honoured).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use url::Url;

use crate::gate::{Backoff, RetryPolicy};

/// Default system instruction sent with every completion request.
const DEFAULT_SYSTEM_PROMPT: &str = "Ти — бот-помічник форуму. Відповідай коротко, культурно, \
    конструктивно і грамотною українською мовою. Якщо питання незрозуміле, попроси уточнити.";

const DEFAULT_INVITE_LINK: &str = "https://t.me/+7Xmj6pPB0mEyMDky";
const DEFAULT_BUTTON_TEXT: &str = "☇ ꜰ ☻‌ ʀ ᴜ ʍ❓";

/// Bot running mode
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Which group (if any) gates the AI relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
    /// No group configured: the gate lets everyone through.
    Disabled,
    /// Membership in this chat is required.
    Chat(i64),
    /// A value was configured but is not a chat id. Fails closed.
    Invalid(String),
}

impl SubscriptionTarget {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Disabled,
            Some(value) => match value.parse::<i64>() {
                Ok(id) => Self::Chat(id),
                Err(_) => Self::Invalid(value.to_string()),
            },
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<Url>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,
    pub locale: String,

    // AI relay
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: Option<String>,
    pub system_prompt: String,
    pub ai_cooldown: Duration,
    pub ai_timeout: Duration,

    // Subscription gate
    pub subscription_target: SubscriptionTarget,
    pub invite_link: String,
    pub invite_button_text: String,
    pub lookup_timeout: Duration,
    pub lookup_retry: RetryPolicy,

    /// Router policy
    pub trigger_keyword: String,
    /// Whether group messages also go through the subscription gate.
    pub check_subscription_in_groups: bool,

    // Join requests
    pub join_max_requests: usize,
    pub join_window: Duration,
    pub join_max_tracked_users: usize,
    pub join_notify_declined: bool,

    // Extras
    pub safe_browsing_api_key: Option<String>,
    pub webapp_url: Option<Url>,
}

/// Shows whether a secret is set without printing it.
fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "<redacted>" } else { "<unset>" }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("bot_mode", &self.bot_mode)
            .field("webhook_url", &self.webhook_url.as_ref().map(Url::as_str))
            .field("webhook_port", &self.webhook_port)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("locale", &self.locale)
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("ai_cooldown", &self.ai_cooldown)
            .field("ai_timeout", &self.ai_timeout)
            .field("subscription_target", &self.subscription_target)
            .field("invite_link", &self.invite_link)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("lookup_retry", &self.lookup_retry)
            .field("trigger_keyword", &self.trigger_keyword)
            .field("check_subscription_in_groups", &self.check_subscription_in_groups)
            .field("join_max_requests", &self.join_max_requests)
            .field("join_window", &self.join_window)
            .field("join_max_tracked_users", &self.join_max_tracked_users)
            .field("join_notify_declined", &self.join_notify_declined)
            .field("safe_browsing_api_key", &redact(&self.safe_browsing_api_key))
            .field("webapp_url", &self.webapp_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        // Render deployments always run behind a webhook.
        let on_render = get("RENDER").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let bot_mode = match get("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            Some("webhook") => BotMode::Webhook,
            Some(_) => BotMode::Polling,
            None if on_render => BotMode::Webhook,
            None => BotMode::Polling,
        };

        let webhook_url = get("WEBHOOK_URL")
            .or_else(|| get("RENDER_EXTERNAL_URL"))
            .map(|raw| webhook_endpoint(&raw))
            .transpose()?;

        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(anyhow!(
                "WEBHOOK_URL or RENDER_EXTERNAL_URL must be set when BOT_MODE is webhook"
            ));
        }

        let webapp_url = get("WEBAPP_URL")
            .map(|raw| Url::parse(&raw).with_context(|| format!("invalid WEBAPP_URL: {raw}")))
            .transpose()?;

        let retry_delay = Duration::from_millis(parse_or(&get, "LOOKUP_RETRY_DELAY_MS", 1000)?);

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_port: parse_or(&get, "PORT", 8080)?,
            webhook_secret: get("WEBHOOK_SECRET"),
            locale: get("BOT_LOCALE").unwrap_or_else(|| "uk".to_string()),

            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            gemini_base_url: get("GEMINI_BASE_URL"),
            system_prompt: get("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            ai_cooldown: Duration::from_secs(parse_or(&get, "AI_COOLDOWN_SECS", 60)?),
            ai_timeout: Duration::from_secs(parse_or(&get, "AI_TIMEOUT_SECS", 30)?),

            subscription_target: SubscriptionTarget::parse(get("TELEGRAM_CHAT_ID").as_deref()),
            invite_link: get("FORUM_INVITE_LINK").unwrap_or_else(|| DEFAULT_INVITE_LINK.to_string()),
            invite_button_text: get("FORUM_BUTTON_TEXT")
                .unwrap_or_else(|| DEFAULT_BUTTON_TEXT.to_string()),
            lookup_timeout: Duration::from_secs(parse_or(&get, "LOOKUP_TIMEOUT_SECS", 15)?),
            lookup_retry: RetryPolicy {
                max_attempts: parse_or(&get, "LOOKUP_RETRY_ATTEMPTS", 2)?,
                backoff: Backoff::Fixed(retry_delay),
            },

            trigger_keyword: get("TRIGGER_KEYWORD").unwrap_or_else(|| "ало".to_string()),
            check_subscription_in_groups: parse_flag(&get, "GROUP_SUBSCRIPTION_CHECK", false)?,

            join_max_requests: parse_or(&get, "JOIN_MAX_REQUESTS", 3)?,
            join_window: Duration::from_secs(parse_or(&get, "JOIN_WINDOW_SECS", 300)?),
            join_max_tracked_users: parse_or(&get, "JOIN_MAX_TRACKED_USERS", 10_000)?,
            join_notify_declined: parse_flag(&get, "JOIN_NOTIFY_DECLINED", true)?,

            safe_browsing_api_key: get("SAFE_BROWSING_API_KEY")
                .or_else(|| get("GOOGLE_SAFE_BROWSING_API_KEY")),
            webapp_url,
        })
    }
}

/// Turn the public base URL into the webhook endpoint.
///
/// The root path is reserved for the health route, so a bare host gets `/webhook`.
fn webhook_endpoint(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid webhook URL: {raw}"))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/webhook");
    }
    Ok(url)
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}

fn parse_flag<G>(get: &G, key: &str, default: bool) -> anyhow::Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(anyhow!("invalid value for {key}: {other}")),
    }
}
