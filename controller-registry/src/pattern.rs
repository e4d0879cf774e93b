//! Match predicates over an update's payload (message text or callback data).

use dbot_core::{DbotError, Result};
use regex::Regex;
use std::fmt;

/// Predicate a handler declares for its trigger kind.
#[derive(Clone)]
pub enum Pattern {
    /// Matches any payload, including a missing one.
    Any,
    /// Whole payload equals the string.
    Exact(String),
    /// Bot command: `/name`, `/name args` and `/name@botname args` all match `Command("name")`.
    Command(String),
    Prefix(String),
    Regex(Regex),
}

impl Pattern {
    /// Command pattern; a leading `/` in `name` is optional.
    pub fn command(name: &str) -> Self {
        Pattern::Command(name.trim_start_matches('/').to_string())
    }

    pub fn exact(value: impl Into<String>) -> Self {
        Pattern::Exact(value.into())
    }

    pub fn prefix(value: impl Into<String>) -> Self {
        Pattern::Prefix(value.into())
    }

    /// Compiles a regex pattern; an invalid expression is a registration error.
    pub fn regex(expr: &str) -> Result<Self> {
        Regex::new(expr)
            .map(Pattern::Regex)
            .map_err(|e| DbotError::Routing(format!("Invalid pattern {:?}: {}", expr, e)))
    }

    /// Whether `payload` satisfies the predicate. Only [`Pattern::Any`] matches a missing payload.
    pub fn matches(&self, payload: Option<&str>) -> bool {
        let Some(input) = payload else {
            return matches!(self, Pattern::Any);
        };
        match self {
            Pattern::Any => true,
            Pattern::Exact(expected) => input == expected,
            Pattern::Command(name) => command_name(input).is_some_and(|cmd| cmd == name),
            Pattern::Prefix(prefix) => input.starts_with(prefix.as_str()),
            Pattern::Regex(re) => re.is_match(input),
        }
    }
}

/// Extracts `name` from `/name@bot args`; `None` when the text is not a command.
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let cmd = first.strip_prefix('/')?;
    let cmd = cmd.split('@').next().unwrap_or(cmd);
    (!cmd.is_empty()).then_some(cmd)
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => write!(f, "Any"),
            Pattern::Exact(s) => write!(f, "Exact({:?})", s),
            Pattern::Command(s) => write!(f, "Command(/{})", s),
            Pattern::Prefix(s) => write!(f, "Prefix({:?})", s),
            Pattern::Regex(re) => write!(f, "Regex({:?})", re.as_str()),
        }
    }
}
