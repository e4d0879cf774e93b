//! # update-dispatcher
//!
//! For each incoming update the [`Dispatcher`] asks the action store whether the chat is mid-action:
//! if so the next step of that action runs, otherwise the update is routed fresh through the
//! [`controller_registry::ControllerRegistry`]. State transitions are committed only after the handler
//! returned successfully; every failure goes to the [`dbot_core::ExceptionSink`].
//!
//! [`UpdateLoop`] drives the dispatcher from an [`dbot_core::UpdateSource`] with per-chat ordering,
//! cancellation and drain.

mod dispatcher;
mod update_loop;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use update_loop::{UpdateLoop, UpdateLoopConfig};

// Tests live in tests/dispatcher_test.rs and tests/update_loop_test.rs
