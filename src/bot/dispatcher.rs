//! Message dispatcher setup.
//!
//! Builds the shared state and the handler tree.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::config::{Config, SubscriptionTarget};
use crate::events;
use crate::gate::{AdmissionLimiter, CooldownGate, SubscriptionGate};
use crate::i18n;
use crate::membership::{MemberStatus, TelegramMembership};
use crate::plugins::{self, webapp::ReminderScheduler};
use crate::router::{ChatRelay, JoinFlow, RouterPolicy};
use crate::services::{GeminiClient, SafeBrowsingClient, TextCompletion};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

pub type BotDispatcher = Dispatcher<ThrottledBot, anyhow::Error, DefaultKey>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Cache registry, kept for stats.
    pub cache: Arc<CacheRegistry>,

    /// Subscription gate + cooldown + completion backend.
    pub relay: ChatRelay,

    /// Admission limiter + approve/decline.
    pub joins: JoinFlow,

    pub policy: RouterPolicy,

    /// `None` when no Safe Browsing key is configured.
    pub links: Option<SafeBrowsingClient>,

    pub reminders: ReminderScheduler,

    /// (chat, user) pairs greeted by the join flow, so the service-message
    /// welcome skips them.
    pub recent_welcomes: TypedCache<(i64, u64), ()>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(bot: &ThrottledBot, config: Arc<Config>, cache: Arc<CacheRegistry>) -> anyhow::Result<Self> {
        if !i18n::is_supported(&config.locale) {
            warn!(
                locale = %config.locale,
                fallback = i18n::FALLBACK_LOCALE,
                "no message catalog for BOT_LOCALE"
            );
        }

        // Membership reads and join decisions go straight to the API; the
        // gates in front of them already bound the call rate.
        let telegram = Arc::new(TelegramMembership::new(bot.inner().clone()));

        let membership_cache: TypedCache<(i64, u64), MemberStatus> =
            cache.get_or_create("membership", CacheConfig::membership());
        let subscription = SubscriptionGate::new(
            telegram.clone(),
            config.subscription_target.clone(),
            config.lookup_retry,
            config.lookup_timeout,
            membership_cache,
        );
        match subscription.target() {
            SubscriptionTarget::Disabled => info!("TELEGRAM_CHAT_ID is not set, subscription gate disabled"),
            SubscriptionTarget::Chat(chat_id) => info!(chat_id, "subscription gate enabled"),
            SubscriptionTarget::Invalid(raw) => {
                warn!(raw = %raw, "TELEGRAM_CHAT_ID is not a chat id, gated requests will be refused")
            }
        }

        let completion: Option<Arc<dyn TextCompletion>> = match &config.gemini_api_key {
            Some(key) => {
                let client = GeminiClient::new(
                    key.clone(),
                    config.gemini_model.clone(),
                    config.gemini_base_url.clone(),
                    config.ai_timeout,
                )?;
                info!(model = %config.gemini_model, "AI replies enabled");
                Some(Arc::new(client) as Arc<dyn TextCompletion>)
            }
            None => {
                warn!("GEMINI_API_KEY is not set, AI replies are disabled");
                None
            }
        };

        let relay = ChatRelay::new(
            subscription,
            CooldownGate::new(config.ai_cooldown),
            completion,
            config.system_prompt.as_str(),
            config.ai_timeout,
        );
        info!(cooldown_secs = relay.cooldown().min_interval().as_secs(), "AI cooldown configured");

        let limiter = AdmissionLimiter::new(
            config.join_max_requests,
            config.join_window,
            config.join_max_tracked_users,
        );
        let joins = JoinFlow::new(limiter, telegram);

        let links = match &config.safe_browsing_api_key {
            Some(key) => Some(SafeBrowsingClient::new(key.clone())?),
            None => {
                info!("No Safe Browsing key configured, link scanning is disabled");
                None
            }
        };

        let policy = RouterPolicy {
            trigger_keyword: config.trigger_keyword.clone(),
            check_subscription_in_groups: config.check_subscription_in_groups,
        };

        let recent_welcomes = cache.get_or_create("recent_welcomes", CacheConfig::recent_welcomes());

        Ok(Self {
            config,
            cache,
            relay,
            joins,
            policy,
            links,
            reminders: ReminderScheduler::default(),
            recent_welcomes,
        })
    }

    pub fn locale(&self) -> &str {
        &self.config.locale
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(bot: ThrottledBot, state: AppState) -> BotDispatcher {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("Error in update handler"))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Commands first; everything else goes through the event handlers.
    let message_handler = Update::filter_message()
        .branch(plugins::command_handler())
        .branch(events::message_event_handler());

    let join_request_handler = Update::filter_chat_join_request().endpoint(events::join_request::handler);

    dptree::entry()
        .branch(message_handler)
        .branch(join_request_handler)
        .branch(plugins::callback_handler())
}
