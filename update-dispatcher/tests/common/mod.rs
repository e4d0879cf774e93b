//! Shared fixtures: recording bot and sink, scripted handlers and steps, update builders, channel source.

#![allow(dead_code)] // each test binary uses a different subset

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dbot_core::{
    ActionStep, Bot, BotContext, CallbackQuery, DbotError, ExceptionSink, Handler, HandlerError, IncomingMessage,
    PollError, StepOutcome, Update, UpdateKind, UpdateSource, User,
};
use tokio::sync::mpsc;

/// Bot that records every sent text as `(chat_id, text)`.
#[derive(Default)]
pub struct RecordingBot {
    pub sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Bot for RecordingBot {
    async fn send_message(&self, chat_id: i64, text: &str) -> dbot_core::Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn edit_message(&self, _chat_id: i64, _message_id: i32, _text: &str) -> dbot_core::Result<()> {
        Ok(())
    }

    async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> dbot_core::Result<()> {
        Ok(())
    }
}

/// One recorded call to the exception sink.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub error: String,
    pub is_timeout: bool,
    pub update_id: Option<u32>,
}

#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<SinkRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExceptionSink for RecordingSink {
    async fn handle(&self, error: &DbotError, _bot: &dyn Bot, update: Option<&Update>) {
        self.records.lock().unwrap().push(SinkRecord {
            error: error.to_string(),
            is_timeout: matches!(error, DbotError::Timeout(_)),
            update_id: update.map(|u| u.id),
        });
    }
}

/// Fresh-routing handler: records texts, optionally requests a transition, optionally fails.
#[derive(Default)]
pub struct ScriptedHandler {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    pub start: Option<&'static str>,
    pub cancel: bool,
    pub fail: bool,
    /// Panics when the update text equals this.
    pub panic_on: Option<&'static str>,
    pub delay: Option<Duration>,
    pub done_tx: Option<mpsc::UnboundedSender<(i64, String)>>,
}

impl ScriptedHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    async fn handle(&self, ctx: &BotContext) -> dbot_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = ctx.text().unwrap_or_default().to_string();
        self.texts.lock().unwrap().push(text.clone());
        if self.panic_on == Some(text.as_str()) {
            panic!("handler blew up on {}", text);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(action) = self.start {
            ctx.start_action(action);
        }
        if self.cancel {
            ctx.cancel_action();
        }
        if let Some(tx) = &self.done_tx {
            let _ = tx.send((ctx.chat_id(), text));
        }
        if self.fail {
            return Err(HandlerError::Failed("scripted failure".to_string()).into());
        }
        Ok(())
    }
}

/// Action step returning a fixed outcome; can also request a transition or fail.
pub struct ScriptedStep {
    pub outcome: StepOutcome,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    pub start: Option<&'static str>,
    pub cancel: bool,
    pub fail: bool,
    pub panic_on: Option<&'static str>,
    pub done_tx: Option<mpsc::UnboundedSender<(i64, String)>>,
}

impl ScriptedStep {
    pub fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            start: None,
            cancel: false,
            fail: false,
            panic_on: None,
            done_tx: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionStep for ScriptedStep {
    async fn run(&self, ctx: &BotContext) -> dbot_core::Result<StepOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = ctx.text().unwrap_or_default().to_string();
        self.texts.lock().unwrap().push(text.clone());
        if self.panic_on == Some(text.as_str()) {
            panic!("step blew up on {}", text);
        }
        if let Some(action) = self.start {
            ctx.start_action(action);
        }
        if self.cancel {
            ctx.cancel_action();
        }
        if let Some(tx) = &self.done_tx {
            let _ = tx.send((ctx.chat_id(), text));
        }
        if self.fail {
            return Err(HandlerError::Failed("scripted step failure".to_string()).into());
        }
        Ok(self.outcome)
    }
}

pub fn user() -> User {
    User {
        id: 7,
        username: Some("test_user".to_string()),
        first_name: Some("Test".to_string()),
        last_name: None,
    }
}

pub fn text_update(id: u32, chat_id: i64, text: &str) -> Update {
    Update::new(
        id,
        chat_id,
        UpdateKind::Message(IncomingMessage {
            message_id: id as i32,
            from: Some(user()),
            text: Some(text.to_string()),
        }),
    )
}

pub fn callback_update(id: u32, chat_id: i64, data: &str) -> Update {
    Update::new(
        id,
        chat_id,
        UpdateKind::CallbackQuery(CallbackQuery {
            id: format!("cb-{}", id),
            from: user(),
            data: Some(data.to_string()),
            message_id: Some(1),
        }),
    )
}

/// Update source fed by the test through a channel. Once the sender is dropped it behaves like an
/// idle long poll that never returns.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Vec<Update>, PollError>>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::UnboundedSender<Result<Vec<Update>, PollError>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl UpdateSource for ChannelSource {
    async fn next_batch(&mut self) -> Result<Vec<Update>, PollError> {
        match self.rx.recv().await {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }
}
