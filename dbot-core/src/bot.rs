//! Bot abstraction for outbound calls (send, edit, answer callback).
//!
//! [`Bot`] is transport-agnostic; dbot-telegram implements it via teloxide, tests substitute a recording mock.

use crate::error::Result;
use async_trait::async_trait;

/// Outbound client handle. Every call may fail; errors propagate to the caller as [`crate::DbotError::Bot`].
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message to the given chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
    /// Replaces the text of an already-sent message.
    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()>;
    /// Acknowledges a callback query, optionally with a toast text.
    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
