//! Error types shared by the registry, dispatcher and Telegram binding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    /// No handler and no fallback for an update shape; a registration defect.
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Poll error: {0}")]
    Poll(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Failures raised by handlers, action steps and action-state transitions.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action {action} has no step {step}")]
    StepOutOfRange { action: String, step: u32 },

    #[error("Handler failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, DbotError>;
