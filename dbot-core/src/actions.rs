//! Per-chat multi-step action state: the contract the dispatcher relies on.

use async_trait::async_trait;

use crate::types::ActionStepInfo;

/// Store of in-progress actions keyed by chat id. At most one entry per chat.
///
/// Operations on the same chat id must be linearizable; different chats are independent.
#[async_trait]
pub trait UsersActions: Send + Sync {
    /// Starts `action_name` for the chat at step 0, replacing any previous entry.
    async fn handle_user(&self, chat_id: i64, action_name: &str);
    /// Pure lookup; `None` means the chat takes the fresh routing path.
    async fn get_action_step_info(&self, chat_id: i64) -> Option<ActionStepInfo>;
    /// Advances the step by one. No-op when the chat has no entry.
    async fn increment_step(&self, chat_id: i64);
    /// Drops the entry. No-op when absent.
    async fn remove_user(&self, chat_id: i64);
}
