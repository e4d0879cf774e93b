//! Echo bot: repeats text messages, answers stray callbacks, logs anything else.
//!
//! ```text
//! BOT_TOKEN=... cargo run --bin echo-bot
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use controller_registry::{ControllerRegistry, Pattern};
use dbot_core::{init_tracing, BotContext, Handler, LoggingExceptionSink, UpdateKind};
use dbot_telegram::{cancel_on_ctrl_c, run_polling, TelegramConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;
use users_actions::InMemoryUsersActions;

#[derive(Parser)]
#[command(name = "echo-bot", about = "Echoes every text message back")]
struct Cli {
    /// Overrides BOT_TOKEN.
    #[arg(short, long)]
    token: Option<String>,
}

struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        let text = ctx.text().unwrap_or_default();
        info!(chat_id = ctx.chat_id(), message_content = %text, "Echoing message");
        ctx.reply(&format!("Echo: {}", text)).await
    }
}

struct NonTextHandler;

#[async_trait]
impl Handler for NonTextHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        ctx.reply("I can only echo text.").await
    }
}

/// Acknowledges callbacks so the client stops showing a spinner.
struct AckCallbackHandler;

#[async_trait]
impl Handler for AckCallbackHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        if let UpdateKind::CallbackQuery(ref query) = ctx.update().kind {
            ctx.bot().answer_callback_query(&query.id, None).await?;
        }
        Ok(())
    }
}

struct IgnoreHandler;

#[async_trait]
impl Handler for IgnoreHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        info!(update_id = ctx.update().id, "Ignoring update");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = TelegramConfig::load(cli.token)?;
    init_tracing(&config.log_file)?;

    let registry = ControllerRegistry::builder()
        .message(Pattern::Any, Arc::new(EchoHandler))
        .unknown_message(Arc::new(NonTextHandler))
        .unknown_callback(Arc::new(AckCallbackHandler))
        .unknown_update(Arc::new(IgnoreHandler))
        .build()?;

    let cancel = cancel_on_ctrl_c(CancellationToken::new());
    run_polling(
        &config,
        registry,
        Arc::new(InMemoryUsersActions::new()),
        Arc::new(LoggingExceptionSink),
        cancel,
    )
    .await
}
