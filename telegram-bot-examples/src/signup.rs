//! Signup bot: `/signup` starts a three-step conversation (name, age, confirmation).
//! Send `/cancel` at any step to abort.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use controller_registry::{ControllerRegistry, Pattern};
use dbot_core::{
    init_tracing, ActionStep, BotContext, Handler, LoggingExceptionSink, StepOutcome, UpdateKind,
};
use dbot_telegram::{cancel_on_ctrl_c, run_polling, TelegramConfig};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;
use users_actions::InMemoryUsersActions;

const SIGNUP: &str = "signup";

#[derive(Parser)]
#[command(name = "signup-bot", about = "Collects a name and age over several messages")]
struct Cli {
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct Draft {
    name: String,
    age: u32,
}

type Drafts = Arc<RwLock<HashMap<i64, Draft>>>;

struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        ctx.reply("Hi! Send /signup to register.").await
    }
}

struct SignupHandler {
    drafts: Drafts,
}

#[async_trait]
impl Handler for SignupHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        self.drafts.write().await.insert(ctx.chat_id(), Draft::default());
        ctx.reply("What is your name? (/cancel to stop)").await?;
        ctx.start_action(SIGNUP);
        Ok(())
    }
}

/// Handles `/cancel` inside the action. Returns true when the step should stop here.
async fn cancelled(ctx: &BotContext, drafts: &Drafts) -> dbot_core::Result<bool> {
    if ctx.text().map(str::trim) != Some("/cancel") {
        return Ok(false);
    }
    drafts.write().await.remove(&ctx.chat_id());
    ctx.cancel_action();
    ctx.reply("Signup cancelled.").await?;
    Ok(true)
}

struct NameStep {
    drafts: Drafts,
}

#[async_trait]
impl ActionStep for NameStep {
    async fn run(&self, ctx: &BotContext) -> dbot_core::Result<StepOutcome> {
        if cancelled(ctx, &self.drafts).await? {
            return Ok(StepOutcome::Done);
        }
        let Some(name) = ctx.text().map(str::trim).filter(|s| !s.is_empty()) else {
            ctx.reply("Please send your name as text.").await?;
            return Ok(StepOutcome::Retry);
        };
        self.drafts
            .write()
            .await
            .entry(ctx.chat_id())
            .or_default()
            .name = name.to_string();
        ctx.reply(&format!("Nice to meet you, {}. How old are you?", name))
            .await?;
        Ok(StepOutcome::Continue)
    }
}

struct AgeStep {
    drafts: Drafts,
}

#[async_trait]
impl ActionStep for AgeStep {
    async fn run(&self, ctx: &BotContext) -> dbot_core::Result<StepOutcome> {
        if cancelled(ctx, &self.drafts).await? {
            return Ok(StepOutcome::Done);
        }
        let Some(age) = ctx.text().and_then(|t| t.trim().parse::<u32>().ok()) else {
            ctx.reply("Please send your age as a number.").await?;
            return Ok(StepOutcome::Retry);
        };
        let draft = {
            let mut drafts = self.drafts.write().await;
            let draft = drafts.entry(ctx.chat_id()).or_default();
            draft.age = age;
            draft.clone()
        };
        ctx.reply(&format!(
            "Register {} ({})? Answer yes or no.",
            draft.name, draft.age
        ))
        .await?;
        Ok(StepOutcome::Continue)
    }
}

struct ConfirmStep {
    drafts: Drafts,
}

#[async_trait]
impl ActionStep for ConfirmStep {
    async fn run(&self, ctx: &BotContext) -> dbot_core::Result<StepOutcome> {
        if cancelled(ctx, &self.drafts).await? {
            return Ok(StepOutcome::Done);
        }
        let answer = ctx.text().unwrap_or_default().trim().to_lowercase();
        let draft = self.drafts.write().await.remove(&ctx.chat_id());
        match (answer.as_str(), draft) {
            ("yes", Some(draft)) => {
                info!(chat_id = ctx.chat_id(), name = %draft.name, age = draft.age, "User signed up");
                ctx.reply(&format!("Welcome aboard, {}!", draft.name)).await?;
            }
            _ => ctx.reply("Nothing saved. Send /signup to try again.").await?,
        }
        Ok(StepOutcome::Done)
    }
}

struct UnknownMessageHandler;

#[async_trait]
impl Handler for UnknownMessageHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        ctx.reply("Unknown command. Send /signup to register.").await
    }
}

struct UnknownCallbackHandler;

#[async_trait]
impl Handler for UnknownCallbackHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        if let UpdateKind::CallbackQuery(ref query) = ctx.update().kind {
            ctx.bot()
                .answer_callback_query(&query.id, Some("This button is no longer active"))
                .await?;
        }
        Ok(())
    }
}

struct UnknownUpdateHandler;

#[async_trait]
impl Handler for UnknownUpdateHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        info!(update_id = ctx.update().id, "Ignoring update");
        Ok(())
    }
}

fn signup_steps(drafts: Drafts) -> Vec<Arc<dyn ActionStep>> {
    let name: Arc<dyn ActionStep> = Arc::new(NameStep {
        drafts: drafts.clone(),
    });
    let age: Arc<dyn ActionStep> = Arc::new(AgeStep {
        drafts: drafts.clone(),
    });
    let confirm: Arc<dyn ActionStep> = Arc::new(ConfirmStep { drafts });
    vec![name, age, confirm]
}

fn build_registry(drafts: Drafts) -> dbot_core::Result<ControllerRegistry> {
    ControllerRegistry::builder()
        .message(Pattern::command("start"), Arc::new(StartHandler))
        .message(
            Pattern::command("signup"),
            Arc::new(SignupHandler {
                drafts: drafts.clone(),
            }),
        )
        .unknown_message(Arc::new(UnknownMessageHandler))
        .unknown_callback(Arc::new(UnknownCallbackHandler))
        .unknown_update(Arc::new(UnknownUpdateHandler))
        .action(SIGNUP, signup_steps(drafts))
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = TelegramConfig::load(cli.token)?;
    init_tracing(&config.log_file)?;

    let registry = build_registry(Drafts::default())?;
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
