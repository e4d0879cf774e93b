//! Inbound update feed abstraction (long polling or webhook).

use async_trait::async_trait;

use crate::error::DbotError;
use crate::types::Update;

/// Failure of the feed itself, categorized by whether polling may go on.
#[derive(Debug)]
pub enum PollError {
    /// Reported, then polling continues.
    Recoverable(DbotError),
    /// Reported, then the update loop ends (e.g. invalid credentials).
    Fatal(DbotError),
}

impl PollError {
    pub fn error(&self) -> &DbotError {
        match self {
            PollError::Recoverable(e) | PollError::Fatal(e) => e,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::Fatal(_))
    }
}

/// Source of updates. Within one chat, updates must be yielded in delivery order.
#[async_trait]
pub trait UpdateSource: Send {
    /// Waits for the next batch. An empty batch is a normal long-poll timeout.
    async fn next_batch(&mut self) -> Result<Vec<Update>, PollError>;
}
