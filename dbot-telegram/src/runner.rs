//! Polling runner: connects to Telegram, builds the dispatcher and drives it from getUpdates until
//! cancelled (Ctrl-C or the caller's token) or the token is rejected.

use std::sync::Arc;

use anyhow::{Context, Result};
use controller_registry::ControllerRegistry;
use dbot_core::{Bot as CoreBot, ExceptionSink, UsersActions};
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use update_dispatcher::{Dispatcher, UpdateLoop};

use crate::bot_adapter::TelegramBotAdapter;
use crate::config::TelegramConfig;
use crate::polling::TelegramPolling;

/// Builds the teloxide Bot from config, applying TELEGRAM_API_URL when set.
pub fn build_bot(config: &TelegramConfig) -> Result<teloxide::Bot> {
    let bot = teloxide::Bot::new(config.bot_token.clone());
    match config.telegram_api_url {
        Some(ref url_str) => {
            let url = reqwest::Url::parse(url_str)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", url_str))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Cancels `cancel` on Ctrl-C. Returns the token for chaining.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) -> CancellationToken {
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping update loop");
                token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    cancel
}

/// Runs the bot: validates config, checks the token with getMe, then polls and dispatches until
/// `cancel` fires. In-flight updates are drained before returning.
///
/// Fails on invalid config, a rejected token (at startup or while polling).
#[instrument(skip_all)]
pub async fn run_polling(
    config: &TelegramConfig,
    registry: ControllerRegistry,
    actions: Arc<dyn UsersActions>,
    sink: Arc<dyn ExceptionSink>,
    cancel: CancellationToken,
) -> Result<()> {
    config.validate()?;
    let bot = build_bot(config)?;

    match bot.get_me().await {
        Ok(me) => {
            let username = me.user.username.clone().unwrap_or_default();
            info!(username = %username, "Start listening for @{}", username);
        }
        Err(RequestError::Api(ApiError::InvalidToken)) => {
            anyhow::bail!("Telegram rejected the bot token");
        }
        Err(e) => warn!(error = %e, "getMe failed, polling anyway"),
    }

    info!(
        actions = ?registry.action_names().collect::<Vec<_>>(),
        "Controllers registered"
    );
    let mut dispatcher = Dispatcher::new(Arc::new(registry), actions, sink);
    if let Some(timeout) = config.handler_timeout {
        dispatcher = dispatcher.with_handler_timeout(timeout);
    }

    let update_loop = UpdateLoop::new(Arc::new(dispatcher), config.update_loop_config());
    let source = TelegramPolling::new(bot.clone(), config.poll_timeout_secs);
    let core_bot: Arc<dyn CoreBot> = Arc::new(TelegramBotAdapter::new(bot));

    info!(
        poll_timeout_secs = config.poll_timeout_secs,
        handler_timeout = ?config.handler_timeout,
        "Bot started successfully"
    );
    update_loop.run(source, core_bot, cancel).await?;
    info!("Bot stopped");
    Ok(())
}
