//! Core types: user, inbound update and its payloads, trigger kinds, action state, step outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identity (id, username, names).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A message update. `text` is `None` for non-text messages (photo, sticker, location, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i32,
    pub from: Option<User>,
    pub text: Option<String>,
}

/// Inline keyboard button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Transport id, needed to answer the query.
    pub id: String,
    pub from: User,
    pub data: Option<String>,
    /// Id of the message the keyboard was attached to, if still accessible.
    pub message_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub from: User,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    pub from: User,
    pub query: String,
}

/// Update payload by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    Message(IncomingMessage),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    /// Any update type the dispatcher has no dedicated route for; carries the type name.
    Other(String),
}

/// One inbound event. Immutable for the duration of a dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub id: u32,
    /// Chat key for action state. For updates without a chat (inline queries) this is the sender's user id.
    pub chat_id: i64,
    pub kind: UpdateKind,
    /// When the update was taken off the transport; dispatch logs the queueing delay from it.
    pub received_at: DateTime<Utc>,
}

impl Update {
    pub fn new(id: u32, chat_id: i64, kind: UpdateKind) -> Self {
        Self {
            id,
            chat_id,
            kind,
            received_at: Utc::now(),
        }
    }

    /// Milliseconds since the update was received.
    pub fn waited_ms(&self) -> i64 {
        (Utc::now() - self.received_at).num_milliseconds()
    }

    /// Text of a text message; `None` for every other update.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Message(m) => m.text.as_deref(),
            _ => None,
        }
    }

    /// Callback data of a callback query; `None` for every other update.
    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => q.data.as_deref(),
            _ => None,
        }
    }

    /// Sender of the update, when the transport reports one.
    pub fn from(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::InlineQuery(q) => Some(&q.from),
            UpdateKind::ChosenInlineResult(r) => Some(&r.from),
            UpdateKind::Other(_) => None,
        }
    }
}

/// What a handler is registered for. Fresh routing classifies every update into exactly one of the
/// specific kinds and falls back to the matching `Unknown*` kind when nothing specific matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    MessageText,
    Callback,
    InlineQuery,
    ChosenInlineResult,
    UnknownMessage,
    UnknownCallback,
    UnknownUpdate,
}

impl TriggerKind {
    /// Specific trigger kind an update is classified as before predicate matching.
    pub fn from_update(update: &Update) -> Self {
        match &update.kind {
            UpdateKind::Message(m) if m.text.is_some() => TriggerKind::MessageText,
            UpdateKind::Message(_) => TriggerKind::UnknownMessage,
            UpdateKind::CallbackQuery(_) => TriggerKind::Callback,
            UpdateKind::InlineQuery(_) => TriggerKind::InlineQuery,
            UpdateKind::ChosenInlineResult(_) => TriggerKind::ChosenInlineResult,
            UpdateKind::Other(_) => TriggerKind::UnknownUpdate,
        }
    }

    /// Fallback kind used when no specific handler matches.
    pub fn fallback(self) -> Self {
        match self {
            TriggerKind::MessageText | TriggerKind::UnknownMessage => TriggerKind::UnknownMessage,
            TriggerKind::Callback | TriggerKind::UnknownCallback => TriggerKind::UnknownCallback,
            TriggerKind::InlineQuery
            | TriggerKind::ChosenInlineResult
            | TriggerKind::UnknownUpdate => TriggerKind::UnknownUpdate,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(
            self,
            TriggerKind::UnknownMessage | TriggerKind::UnknownCallback | TriggerKind::UnknownUpdate
        )
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::MessageText => "message_text",
            TriggerKind::Callback => "callback",
            TriggerKind::InlineQuery => "inline_query",
            TriggerKind::ChosenInlineResult => "chosen_inline_result",
            TriggerKind::UnknownMessage => "unknown_message",
            TriggerKind::UnknownCallback => "unknown_callback",
            TriggerKind::UnknownUpdate => "unknown_update",
        };
        f.write_str(name)
    }
}

/// In-progress multi-step action of one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStepInfo {
    pub action_name: String,
    /// Index of the next step to run.
    pub step: u32,
}

/// Result of one action step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Advance to the next step on the chat's next update.
    Continue,
    /// Action finished; the chat goes back to fresh routing.
    Done,
    /// Stay on this step; the chat's next update runs it again (e.g. after rejected input).
    Retry,
}
