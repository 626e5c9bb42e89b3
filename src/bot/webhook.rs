//! Webhook mode implementation for the bot.
//!
//! Uses teloxide's axum integration for the update endpoint and mounts a
//! `GET /` health route on the same router, so one port serves both
//! Telegram and the hosting platform's health checks. The webhook is
//! deleted once the server stops.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::{error, info};

use super::dispatcher::{BotDispatcher, ThrottledBot};
use crate::config::Config;

/// Health route response body.
async fn health() -> &'static str {
    "OK"
}

fn health_router() -> Router {
    Router::new().route("/", get(health))
}

/// Start the bot in webhook mode and dispatch until shutdown.
pub async fn start_webhook(config: &Config, mut dispatcher: BotDispatcher, bot: ThrottledBot) -> anyhow::Result<()> {
    let url = config
        .webhook_url
        .clone()
        .context("WEBHOOK_URL must be set when using webhook mode")?;

    let address = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    let mut options = Options::new(address, url.clone()).drop_pending_updates();
    if let Some(secret) = &config.webhook_secret {
        options = options.secret_token(secret.clone());
        info!("Webhook secret token configured");
    }

    info!("Setting webhook URL: {}", url);

    // setWebhook goes through the plain bot; the throttle queue is for chat traffic.
    let (listener, stop_flag, webhook_router) = webhooks::axum_to_router(bot.inner().clone(), options)
        .await
        .context("failed to register webhook")?;

    let app = webhook_router.merge(health_router());
    let tcp = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Listening on: {}", address);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
            error!("Webhook server error: {}", e);
        }
    });

    let error_handler = LoggingErrorHandler::with_custom_text("Error from update listener");
    dispatcher.dispatch_with_listener(listener, error_handler).await;

    Ok(())
}
