//! Long-polling update source over teloxide getUpdates.

use async_trait::async_trait;
use dbot_core::{DbotError, PollError, Update, UpdateSource};
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::adapters::TelegramUpdateWrapper;

/// [`UpdateSource`] backed by `getUpdates`. Tracks the offset so every update is yielded once.
pub struct TelegramPolling {
    bot: teloxide::Bot,
    offset: i32,
    timeout_secs: u32,
}

impl TelegramPolling {
    pub fn new(bot: teloxide::Bot, timeout_secs: u32) -> Self {
        Self {
            bot,
            offset: 0,
            timeout_secs,
        }
    }

    /// Next offset to request (last seen update id + 1).
    pub fn offset(&self) -> i32 {
        self.offset
    }
}

/// Invalid credentials end polling; anything else (network, rate limit, conflict) is retried.
pub(crate) fn classify(e: RequestError) -> PollError {
    let message = e.to_string();
    match e {
        RequestError::Api(ApiError::InvalidToken) => PollError::Fatal(DbotError::Poll(message)),
        _ => PollError::Recoverable(DbotError::Poll(message)),
    }
}

#[async_trait]
impl UpdateSource for TelegramPolling {
    async fn next_batch(&mut self) -> Result<Vec<Update>, PollError> {
        let updates = self
            .bot
            .get_updates()
            .offset(self.offset)
            .timeout(self.timeout_secs)
            .await
            .map_err(classify)?;

        let mut batch = Vec::with_capacity(updates.len());
        for update in &updates {
            self.offset = self.offset.max(update.id.0 as i32 + 1);
            batch.push(TelegramUpdateWrapper(update).to_core());
        }
        if !batch.is_empty() {
            debug!(count = batch.len(), offset = self.offset, "Polled updates");
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_token_is_fatal() {
        assert!(classify(RequestError::Api(ApiError::InvalidToken)).is_fatal());
    }

    #[test]
    fn test_other_errors_are_recoverable() {
        let e = classify(RequestError::Api(ApiError::MessageNotModified));
        assert!(!e.is_fatal());
        assert!(matches!(e.error(), DbotError::Poll(_)));
    }

    #[test]
    fn test_offset_starts_at_zero() {
        let polling = TelegramPolling::new(teloxide::Bot::new("dummy_token"), 10);
        assert_eq!(polling.offset(), 0);
    }
}
