//! Per-update execution context handed to handlers and action steps.

use std::sync::{Arc, Mutex};

use crate::bot::Bot;
use crate::types::Update;

/// Action state change requested by a handler. Applied by the dispatcher only after the handler returns `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTransition {
    Start(String),
    Cancel,
}

/// Client handle + the update being dispatched. Built once per update.
pub struct BotContext {
    bot: Arc<dyn Bot>,
    update: Arc<Update>,
    pending: Mutex<Option<ActionTransition>>,
}

impl BotContext {
    pub fn new(bot: Arc<dyn Bot>, update: Arc<Update>) -> Self {
        Self {
            bot,
            update,
            pending: Mutex::new(None),
        }
    }

    pub fn bot(&self) -> &dyn Bot {
        self.bot.as_ref()
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn chat_id(&self) -> i64 {
        self.update.chat_id
    }

    /// Text of the current update if it is a text message.
    pub fn text(&self) -> Option<&str> {
        self.update.text()
    }

    /// Starts a multi-step action for this chat; takes effect from the chat's next update.
    /// A later call in the same handler replaces an earlier one.
    pub fn start_action(&self, action_name: impl Into<String>) {
        self.set_pending(ActionTransition::Start(action_name.into()));
    }

    /// Ends this chat's action (if any) once the handler succeeds.
    pub fn cancel_action(&self) {
        self.set_pending(ActionTransition::Cancel);
    }

    /// Takes the requested transition, leaving none behind.
    pub fn take_transition(&self) -> Option<ActionTransition> {
        match self.pending.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn set_pending(&self, transition: ActionTransition) {
        match self.pending.lock() {
            Ok(mut guard) => *guard = Some(transition),
            Err(poisoned) => *poisoned.into_inner() = Some(transition),
        }
    }

    /// Replies to the current chat.
    pub async fn reply(&self, text: &str) -> crate::error::Result<()> {
        self.bot.send_message(self.chat_id(), text).await
    }
}
