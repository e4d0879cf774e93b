//! Handler traits: single-shot handlers for fresh routing and steps of multi-step actions.

use async_trait::async_trait;

use crate::context::BotContext;
use crate::error::Result;
use crate::types::StepOutcome;

/// Handler invoked when an update is routed fresh (the chat has no action in progress).
/// May start an action through [`BotContext::start_action`].
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &BotContext) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// One step of a named multi-step action. Step `n` runs on the n-th update after the action started.
#[async_trait]
pub trait ActionStep: Send + Sync {
    async fn run(&self, ctx: &BotContext) -> Result<StepOutcome>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
