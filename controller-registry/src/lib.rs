//! # Controller registry
//!
//! Maps updates to handlers. Built once before the dispatch loop via [`ControllerRegistry::builder`]:
//! handlers are registered per trigger kind with a [`Pattern`], and named multi-step actions are
//! registered as ordered step lists. `build()` fails when a fallback kind is missing, so an update can
//! never be dropped for lack of a handler at runtime.

mod pattern;
mod registry;

pub use pattern::Pattern;
pub use registry::{
    Action, ControllerRegistry, ControllerRegistryBuilder, HandlerDescriptor, ResolvedStep, Route,
};

// Integration tests live in tests/registry_test.rs
