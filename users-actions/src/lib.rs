//! # users-actions
//!
//! In-memory implementation of [`dbot_core::UsersActions`]: which chat is in the middle of which
//! multi-step action, and at which step.
//!
//! ## Example
//!
//! ```rust
//! use dbot_core::UsersActions;
//! use users_actions::InMemoryUsersActions;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryUsersActions::new();
//!     store.handle_user(42, "signup").await;
//!     store.increment_step(42).await;
//!
//!     let info = store.get_action_step_info(42).await.unwrap();
//!     assert_eq!(info.action_name, "signup");
//!     assert_eq!(info.step, 1);
//! }
//! ```
//!
//! ## Thread Safety
//!
//! Entries live in one `Arc<RwLock<HashMap>>`; every operation holds the lock for a single map access,
//! so operations on one chat are linearizable and no guard is held across an await.

use async_trait::async_trait;
use dbot_core::{ActionStepInfo, UsersActions};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory action state store. Data is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUsersActions {
    entries: Arc<RwLock<HashMap<i64, ActionStepInfo>>>,
}

impl InMemoryUsersActions {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chats with an active action.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every active action.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl UsersActions for InMemoryUsersActions {
    async fn handle_user(&self, chat_id: i64, action_name: &str) {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(
            chat_id,
            ActionStepInfo {
                action_name: action_name.to_string(),
                step: 0,
            },
        );
        debug!(
            chat_id = chat_id,
            action = %action_name,
            replaced = ?previous.map(|p| p.action_name),
            "step: action started"
        );
    }

    async fn get_action_step_info(&self, chat_id: i64) -> Option<ActionStepInfo> {
        self.entries.read().await.get(&chat_id).cloned()
    }

    async fn increment_step(&self, chat_id: i64) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&chat_id) {
            Some(info) => {
                info.step += 1;
                debug!(
                    chat_id = chat_id,
                    action = %info.action_name,
                    step = info.step,
                    "step: action advanced"
                );
            }
            None => debug!(chat_id = chat_id, "increment_step on chat without action, ignored"),
        }
    }

    async fn remove_user(&self, chat_id: i64) {
        if let Some(info) = self.entries.write().await.remove(&chat_id) {
            debug!(
                chat_id = chat_id,
                action = %info.action_name,
                step = info.step,
                "step: action removed"
            );
        }
    }
}
