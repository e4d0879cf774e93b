//! # dbot-telegram
//!
//! Telegram layer: adapters from teloxide updates, [`dbot_core::Bot`] implementation, getUpdates
//! long-polling [`dbot_core::UpdateSource`], minimal config, and the polling runner.
//! Handles only Telegram connectivity; routing and action state live in controller-registry and
//! update-dispatcher.

mod adapters;
mod bot_adapter;
mod config;
mod polling;
mod runner;

pub use adapters::{TelegramUpdateWrapper, TelegramUserWrapper};
pub use bot_adapter::TelegramBotAdapter;
pub use config::TelegramConfig;
pub use polling::TelegramPolling;
pub use runner::{build_bot, cancel_on_ctrl_c, run_polling};
