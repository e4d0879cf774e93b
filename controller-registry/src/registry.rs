//! Registry of handler descriptors and named actions, built and validated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use dbot_core::{ActionStep, DbotError, Handler, HandlerError, Result, TriggerKind, Update, UpdateKind};
use tracing::{debug, info};

use crate::pattern::Pattern;

/// One registered handler: what it is triggered by and what it runs. Immutable after registration.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub trigger: TriggerKind,
    /// `None` matches every update of the trigger kind.
    pub pattern: Option<Pattern>,
    pub handler: Arc<dyn Handler>,
    /// Registration index; lower wins when several descriptors match.
    pub order: usize,
}

impl HandlerDescriptor {
    /// Whether this descriptor accepts `update` (trigger kind and predicate).
    pub fn matches(&self, update: &Update) -> bool {
        if self.trigger != TriggerKind::from_update(update) {
            return false;
        }
        match &self.pattern {
            None => true,
            Some(pattern) => pattern.matches(payload(update)),
        }
    }
}

/// Payload predicates are evaluated against: message text or callback data.
fn payload(update: &Update) -> Option<&str> {
    match &update.kind {
        UpdateKind::Message(m) => m.text.as_deref(),
        UpdateKind::CallbackQuery(q) => q.data.as_deref(),
        UpdateKind::InlineQuery(q) => Some(q.query.as_str()),
        UpdateKind::ChosenInlineResult(r) => Some(r.query.as_str()),
        UpdateKind::Other(_) => None,
    }
}

/// Named multi-step action: `steps[n]` runs for step index `n`.
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub steps: Vec<Arc<dyn ActionStep>>,
}

/// Handler chosen by fresh routing.
pub struct Route<'a> {
    /// Kind the handler was registered for; an `Unknown*` kind means the fallback was taken.
    pub trigger: TriggerKind,
    pub descriptor: &'a HandlerDescriptor,
}

impl Route<'_> {
    pub fn is_fallback(&self) -> bool {
        self.trigger.is_fallback()
    }
}

/// Step callable resolved for `(action, step)`.
pub struct ResolvedStep<'a> {
    pub step: &'a Arc<dyn ActionStep>,
    /// No further step is registered; `Continue` from this step ends the action.
    pub is_last: bool,
}

/// Registered controllers. Matching is first-registered-wins: when several descriptors of the same
/// trigger kind accept an update, the one registered earliest runs.
pub struct ControllerRegistry {
    handlers: Vec<HandlerDescriptor>,
    actions: HashMap<String, Action>,
}

impl ControllerRegistry {
    pub fn builder() -> ControllerRegistryBuilder {
        ControllerRegistryBuilder::new()
    }

    /// Descriptors accepting `update`, in registration order. Fallbacks are not included unless the
    /// update itself classifies as an unknown kind (e.g. a non-text message).
    pub fn candidates(&self, update: &Update) -> Vec<&HandlerDescriptor> {
        self.handlers.iter().filter(|d| d.matches(update)).collect()
    }

    /// Fresh routing: first matching descriptor, else the fallback for the update's kind.
    pub fn route(&self, update: &Update) -> Result<Route<'_>> {
        let kind = TriggerKind::from_update(update);
        if let Some(descriptor) = self.handlers.iter().find(|d| d.matches(update)) {
            debug!(
                update_id = update.id,
                trigger = %kind,
                handler = descriptor.handler.name(),
                "Matched handler"
            );
            return Ok(Route {
                trigger: descriptor.trigger,
                descriptor,
            });
        }

        let fallback = kind.fallback();
        let descriptor = self
            .handlers
            .iter()
            .find(|d| d.trigger == fallback)
            .ok_or_else(|| {
                DbotError::Routing(format!("No handler and no {} fallback for {}", fallback, kind))
            })?;
        debug!(
            update_id = update.id,
            trigger = %kind,
            fallback = %fallback,
            handler = descriptor.handler.name(),
            "No specific handler matched, using fallback"
        );
        Ok(Route {
            trigger: fallback,
            descriptor,
        })
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Step callable for an in-progress action.
    pub fn action_step(&self, name: &str, step: u32) -> Result<ResolvedStep<'_>> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| HandlerError::UnknownAction(name.to_string()))?;
        let index = step as usize;
        let callable = action.steps.get(index).ok_or_else(|| HandlerError::StepOutOfRange {
            action: name.to_string(),
            step,
        })?;
        Ok(ResolvedStep {
            step: callable,
            is_last: index + 1 == action.steps.len(),
        })
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// Registration surface. Call order defines match priority.
#[derive(Default)]
pub struct ControllerRegistryBuilder {
    handlers: Vec<HandlerDescriptor>,
    actions: Vec<Action>,
}

impl ControllerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(
        mut self,
        trigger: TriggerKind,
        pattern: Option<Pattern>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let order = self.handlers.len();
        self.handlers.push(HandlerDescriptor {
            trigger,
            pattern,
            handler,
            order,
        });
        self
    }

    /// Text message handler.
    pub fn message(self, pattern: Pattern, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::MessageText, Some(pattern), handler)
    }

    /// Callback query handler, matched on callback data.
    pub fn callback(self, pattern: Pattern, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::Callback, Some(pattern), handler)
    }

    pub fn inline_query(self, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::InlineQuery, None, handler)
    }

    pub fn chosen_inline_result(self, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::ChosenInlineResult, None, handler)
    }

    /// Fallback for messages no text handler matched, and for non-text messages.
    pub fn unknown_message(self, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::UnknownMessage, None, handler)
    }

    /// Fallback for callback queries no callback handler matched.
    pub fn unknown_callback(self, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::UnknownCallback, None, handler)
    }

    /// Fallback for inline queries / chosen results without handler, and for every other update type.
    pub fn unknown_update(self, handler: Arc<dyn Handler>) -> Self {
        self.register(TriggerKind::UnknownUpdate, None, handler)
    }

    /// Named multi-step action.
    pub fn action(mut self, name: impl Into<String>, steps: Vec<Arc<dyn ActionStep>>) -> Self {
        self.actions.push(Action {
            name: name.into(),
            steps,
        });
        self
    }

    /// Validates and freezes the registry. Every update shape must resolve to a handler, so each
    /// fallback kind is required.
    pub fn build(self) -> Result<ControllerRegistry> {
        for fallback in [
            TriggerKind::UnknownMessage,
            TriggerKind::UnknownCallback,
            TriggerKind::UnknownUpdate,
        ] {
            if !self.handlers.iter().any(|d| d.trigger == fallback) {
                return Err(DbotError::Routing(format!("Missing {} fallback handler", fallback)));
            }
        }

        let mut actions = HashMap::with_capacity(self.actions.len());
        for action in self.actions {
            if action.name.trim().is_empty() {
                return Err(DbotError::Routing("Action name must not be empty".to_string()));
            }
            if action.steps.is_empty() {
                return Err(DbotError::Routing(format!(
                    "Action {} has no steps",
                    action.name
                )));
            }
            if actions.contains_key(&action.name) {
                return Err(DbotError::Routing(format!(
                    "Action {} registered twice",
                    action.name
                )));
            }
            actions.insert(action.name.clone(), action);
        }

        info!(
            handlers = self.handlers.len(),
            actions = actions.len(),
            "Controller registry built"
        );

        Ok(ControllerRegistry {
            handlers: self.handlers,
            actions,
        })
    }
}
