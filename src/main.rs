//! Forum Keeper - Telegram community bot
//!
//! Answers members through an AI backend behind a subscription check and a
//! global cooldown, and admits join requests through a sliding-window limiter.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `cache` - TTL caches with Moka
//! - `gate` - Subscription gate, cooldown gate, admission limiter, retry
//! - `membership` - Telegram membership lookups and join approval
//! - `services` - Gemini and Safe Browsing clients
//! - `router` - Event routing, AI chat relay, join flow
//! - `bot` - Core bot functionality (with Throttle for API rate limiting)
//! - `plugins` - Command handlers and mini-app data
//! - `events` - Event handlers
//! - `i18n` - Message catalogs
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod events;
mod gate;
mod i18n;
mod membership;
mod plugins;
mod router;
mod services;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::AppState;
use cache::CacheRegistry;
use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forum_keeper=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Forum Keeper bot...");

    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);

    let cache = Arc::new(CacheRegistry::new());

    // Throttle keeps outgoing messages inside Telegram's per-chat limits.
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    let state = AppState::new(&bot, config.clone(), cache.clone())?;
    state.joins.limiter().spawn_sweeper();

    let dispatcher = bot::build_dispatcher(bot.clone(), state);
    bot::run(&config, dispatcher, bot).await?;

    for (name, entries) in cache.stats() {
        info!(cache = %name, entries, "cache at shutdown");
    }
    info!("Bot stopped");

    Ok(())
}
