//! Exception sink: receives every error raised while polling or dispatching.

use async_trait::async_trait;
use tracing::error;

use crate::bot::Bot;
use crate::error::DbotError;
use crate::types::{TriggerKind, Update};

/// Best-effort reporting of dispatch and poll failures. Implementations must not panic and should not
/// block for long; the dispatch loop awaits them inline.
#[async_trait]
pub trait ExceptionSink: Send + Sync {
    /// `update` is `None` for failures of the update feed itself.
    async fn handle(&self, error: &DbotError, bot: &dyn Bot, update: Option<&Update>);
}

/// Default sink: logs the error with the update context.
#[derive(Debug, Default, Clone)]
pub struct LoggingExceptionSink;

#[async_trait]
impl ExceptionSink for LoggingExceptionSink {
    async fn handle(&self, error: &DbotError, _bot: &dyn Bot, update: Option<&Update>) {
        match update {
            Some(update) => error!(
                error = %error,
                update_id = update.id,
                chat_id = update.chat_id,
                trigger = %TriggerKind::from_update(update),
                "Update handling failed"
            ),
            None => error!(error = %error, "Polling failed"),
        }
    }
}
