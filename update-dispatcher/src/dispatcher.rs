//! Dispatch state machine: for each update either resume the chat's action or route it fresh.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use controller_registry::ControllerRegistry;
use dbot_core::{
    ActionStepInfo, ActionTransition, Bot, BotContext, DbotError, ExceptionSink, HandlerError,
    Result, StepOutcome, TriggerKind, Update, UsersActions,
};
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

/// Which path an update took. Exactly one path runs per update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The chat was mid-action; `step` of `action` ran and returned `outcome`
    /// (`Done` when the last step returned `Continue`).
    Resumed {
        action: String,
        step: u32,
        outcome: StepOutcome,
    },
    /// Fresh routing ran the handler registered for `trigger`.
    Routed { trigger: TriggerKind },
    /// Resolution, invocation or commit failed; the error went to the exception sink and the chat's
    /// action state is unchanged.
    Failed,
}

/// Per-update dispatcher. Cheap to clone; all state lives behind `Arc`s.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ControllerRegistry>,
    actions: Arc<dyn UsersActions>,
    sink: Arc<dyn ExceptionSink>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ControllerRegistry>,
        actions: Arc<dyn UsersActions>,
        sink: Arc<dyn ExceptionSink>,
    ) -> Self {
        Self {
            registry,
            actions,
            sink,
            handler_timeout: None,
        }
    }

    /// Bounds every handler / step invocation; exceeding it is reported as [`DbotError::Timeout`].
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn sink(&self) -> &Arc<dyn ExceptionSink> {
        &self.sink
    }

    /// Dispatches one update. Never fails: errors are forwarded to the exception sink together with
    /// the bot handle and the update.
    #[instrument(skip_all, fields(update_id = update.id, chat_id = update.chat_id))]
    pub async fn dispatch(&self, bot: Arc<dyn Bot>, update: Update) -> DispatchOutcome {
        debug!(waited_ms = update.waited_ms(), "step: dispatch started");
        let update = Arc::new(update);
        match self.try_dispatch(bot.clone(), update.clone()).await {
            Ok(outcome) => {
                debug!(outcome = ?outcome, "step: dispatch finished");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "step: dispatch failed, reporting to exception sink");
                self.sink.handle(&e, bot.as_ref(), Some(update.as_ref())).await;
                DispatchOutcome::Failed
            }
        }
    }

    async fn try_dispatch(&self, bot: Arc<dyn Bot>, update: Arc<Update>) -> Result<DispatchOutcome> {
        let ctx = BotContext::new(bot, update);
        match self.actions.get_action_step_info(ctx.chat_id()).await {
            Some(info) => self.resume(&ctx, info).await,
            None => self.route_fresh(&ctx).await,
        }
    }

    async fn resume(&self, ctx: &BotContext, info: ActionStepInfo) -> Result<DispatchOutcome> {
        let chat_id = ctx.chat_id();
        info!(
            chat_id = chat_id,
            action = %info.action_name,
            step = info.step,
            "step: resuming action"
        );

        let resolved = self.registry.action_step(&info.action_name, info.step)?;
        let returned = self.guarded(resolved.step.run(ctx), resolved.step.name()).await?;
        let outcome = match returned {
            StepOutcome::Continue if resolved.is_last => StepOutcome::Done,
            other => other,
        };

        match ctx.take_transition() {
            Some(transition) => self.commit(chat_id, transition).await?,
            None => match outcome {
                StepOutcome::Continue => self.actions.increment_step(chat_id).await,
                StepOutcome::Retry => {
                    debug!(chat_id = chat_id, step = info.step, "step: step will run again");
                }
                StepOutcome::Done => {
                    self.actions.remove_user(chat_id).await;
                    info!(chat_id = chat_id, action = %info.action_name, "step: action completed");
                }
            },
        }

        Ok(DispatchOutcome::Resumed {
            action: info.action_name,
            step: info.step,
            outcome,
        })
    }

    async fn route_fresh(&self, ctx: &BotContext) -> Result<DispatchOutcome> {
        let route = self.registry.route(ctx.update())?;
        let handler = &route.descriptor.handler;
        info!(
            chat_id = ctx.chat_id(),
            trigger = %route.trigger,
            handler = handler.name(),
            "step: routing update"
        );

        self.guarded(handler.handle(ctx), handler.name()).await?;

        if let Some(transition) = ctx.take_transition() {
            self.commit(ctx.chat_id(), transition).await?;
        }
        Ok(DispatchOutcome::Routed {
            trigger: route.trigger,
        })
    }

    /// Applies a handler-requested transition. Unknown actions are rejected before any state change.
    async fn commit(&self, chat_id: i64, transition: ActionTransition) -> Result<()> {
        match transition {
            ActionTransition::Start(name) => {
                if !self.registry.has_action(&name) {
                    return Err(HandlerError::UnknownAction(name).into());
                }
                self.actions.handle_user(chat_id, &name).await;
                info!(chat_id = chat_id, action = %name, "step: action started");
            }
            ActionTransition::Cancel => {
                self.actions.remove_user(chat_id).await;
                info!(chat_id = chat_id, "step: action cancelled");
            }
        }
        Ok(())
    }

    /// Runs a handler or step future. A panic is turned into [`HandlerError::Failed`] so it reaches
    /// the sink like any other failure and the chat's worker keeps going.
    async fn guarded<T, F>(&self, fut: F, name: &str) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let fut = AssertUnwindSafe(fut).catch_unwind();
        let caught = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                DbotError::Timeout(format!("{} did not finish within {:?}", name, limit))
            })?,
            None => fut.await,
        };
        caught.unwrap_or_else(|payload| {
            Err(HandlerError::Failed(format!("{} panicked: {}", name, panic_message(&*payload))).into())
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
