//! # dbot-core
//!
//! Core types and collaborator traits for the update dispatcher: [`Update`], [`TriggerKind`],
//! [`BotContext`], [`Handler`], [`ActionStep`], [`Bot`], [`UsersActions`], [`ExceptionSink`], [`UpdateSource`], errors, and tracing
//! initialization. Transport-agnostic; used by controller-registry, update-dispatcher and dbot-telegram.

pub mod actions;
pub mod bot;
pub mod context;
pub mod error;
pub mod exception;
pub mod handler;
pub mod logger;
pub mod source;
pub mod types;

pub use actions::UsersActions;
pub use bot::Bot;
pub use context::{ActionTransition, BotContext};
pub use error::{DbotError, HandlerError, Result};
pub use exception::{ExceptionSink, LoggingExceptionSink};
pub use handler::{ActionStep, Handler};
pub use logger::init_tracing;
pub use source::{PollError, UpdateSource};
pub use types::{
    ActionStepInfo, CallbackQuery, ChosenInlineResult, IncomingMessage, InlineQuery, StepOutcome,
    TriggerKind, Update, UpdateKind, User,
};
