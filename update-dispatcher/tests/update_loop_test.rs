//! Integration tests for [`update_dispatcher::UpdateLoop`].
//!
//! Covers: per-chat delivery order under concurrency, a multi-step action driven through the loop,
//! recoverable and fatal poll errors, cancellation with drain, drain timeout, idle worker restart, and
//! a panicking handler not taking down its chat's queue.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{text_update, ChannelSource, RecordingBot, RecordingSink, ScriptedHandler, ScriptedStep};
use controller_registry::{ControllerRegistry, Pattern};
use dbot_core::{ActionStep, Bot, DbotError, PollError, StepOutcome, UsersActions};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use update_dispatcher::{Dispatcher, UpdateLoop, UpdateLoopConfig};
use users_actions::InMemoryUsersActions;

type Done = mpsc::UnboundedReceiver<(i64, String)>;

struct LoopHarness {
    update_loop: UpdateLoop,
    store: Arc<InMemoryUsersActions>,
    sink: Arc<RecordingSink>,
    bot: Arc<dyn Bot>,
}

/// Registry whose unknown-message handler reports `(chat_id, text)` on `done`, `/signup` starts a
/// three-step action whose steps report too.
fn harness(delay: Option<Duration>, config: UpdateLoopConfig) -> (LoopHarness, Done) {
    harness_panicking_on(None, delay, config)
}

/// Same as [`harness`], but the unknown-message handler panics on the given text.
fn harness_panicking_on(
    panic_on: Option<&'static str>,
    delay: Option<Duration>,
    config: UpdateLoopConfig,
) -> (LoopHarness, Done) {
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let echo = Arc::new(ScriptedHandler {
        delay,
        panic_on,
        done_tx: Some(done_tx.clone()),
        ..Default::default()
    });
    let signup = Arc::new(ScriptedHandler {
        start: Some("signup"),
        done_tx: Some(done_tx.clone()),
        ..Default::default()
    });
    let step = |outcome| {
        let mut step = ScriptedStep::new(outcome);
        step.done_tx = Some(done_tx.clone());
        Arc::new(step) as Arc<dyn ActionStep>
    };

    let registry = ControllerRegistry::builder()
        .message(Pattern::command("signup"), signup)
        .unknown_message(echo.clone())
        .unknown_callback(echo.clone())
        .unknown_update(echo)
        .action(
            "signup",
            vec![
                step(StepOutcome::Continue),
                step(StepOutcome::Continue),
                step(StepOutcome::Done),
            ],
        )
        .build()
        .unwrap();

    let store = Arc::new(InMemoryUsersActions::new());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), store.clone(), sink.clone()));

    (
        LoopHarness {
            update_loop: UpdateLoop::new(dispatcher, config),
            store,
            sink,
            bot: Arc::new(RecordingBot::default()),
        },
        done_rx,
    )
}

async fn recv_n(done: &mut Done, n: usize) -> Vec<(i64, String)> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(done.recv().await.unwrap());
    }
    out
}

fn texts_of(records: &[(i64, String)], chat_id: i64) -> Vec<&str> {
    records
        .iter()
        .filter(|(c, _)| *c == chat_id)
        .map(|(_, t)| t.as_str())
        .collect()
}

/// **Test: Updates of one chat are handled in delivery order while chats interleave.**
#[tokio::test]
async fn test_per_chat_order_preserved() {
    let (h, mut done) = harness(Some(Duration::from_millis(5)), UpdateLoopConfig::default());
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();

    let run = {
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    };
    let run = tokio::spawn(run);

    tx.send(Ok(vec![
        text_update(1, 1, "a1"),
        text_update(2, 2, "b1"),
        text_update(3, 1, "a2"),
    ]))
    .unwrap();
    tx.send(Ok(vec![
        text_update(4, 2, "b2"),
        text_update(5, 1, "a3"),
        text_update(6, 2, "b3"),
    ]))
    .unwrap();

    let records = recv_n(&mut done, 6).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(texts_of(&records, 1), vec!["a1", "a2", "a3"]);
    assert_eq!(texts_of(&records, 2), vec!["b1", "b2", "b3"]);
}

/// **Test: A multi-step action runs to completion through the loop.**
#[tokio::test]
async fn test_action_through_loop() {
    let (h, mut done) = harness(None, UpdateLoopConfig::default());
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();
    let store = h.store.clone();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    tx.send(Ok(vec![
        text_update(1, 42, "/signup"),
        text_update(2, 42, "Alice"),
        text_update(3, 42, "30"),
    ]))
    .unwrap();
    recv_n(&mut done, 3).await;
    // Steps report before returning; the transition is committed right after.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.get_action_step_info(42).await.unwrap().step, 2);

    tx.send(Ok(vec![text_update(4, 42, "alice@example.com")])).unwrap();
    recv_n(&mut done, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.get_action_step_info(42).await.is_none());

    cancel.cancel();
    run.await.unwrap().unwrap();
}

/// **Test: A recoverable poll error is reported without update context and polling continues.**
#[tokio::test]
async fn test_recoverable_poll_error_continues() {
    let config = UpdateLoopConfig {
        poll_error_delay: Duration::from_millis(1),
        ..Default::default()
    };
    let (h, mut done) = harness(None, config);
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();
    let sink = h.sink.clone();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    tx.send(Err(PollError::Recoverable(DbotError::Poll("network down".to_string()))))
        .unwrap();
    tx.send(Ok(vec![text_update(1, 42, "still here")])).unwrap();

    let records = recv_n(&mut done, 1).await;
    assert_eq!(records, vec![(42, "still here".to_string())]);

    cancel.cancel();
    run.await.unwrap().unwrap();

    let sink_records = sink.records();
    assert_eq!(sink_records.len(), 1);
    assert_eq!(sink_records[0].update_id, None);
    assert!(sink_records[0].error.contains("network down"));
}

/// **Test: A fatal poll error ends the loop with that error.**
#[tokio::test]
async fn test_fatal_poll_error_stops_loop() {
    let (h, _done) = harness(None, UpdateLoopConfig::default());
    let (tx, source) = ChannelSource::new();

    tx.send(Err(PollError::Fatal(DbotError::Poll("invalid token".to_string()))))
        .unwrap();

    let result = h
        .update_loop
        .run(source, h.bot.clone(), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(DbotError::Poll(_))));
    assert_eq!(h.sink.records().len(), 1);
}

/// **Test: Cancellation lets an in-flight handler finish before run returns.**
#[tokio::test]
async fn test_cancel_drains_in_flight() {
    let (h, mut done) = harness(Some(Duration::from_millis(50)), UpdateLoopConfig::default());
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();
    let sink = h.sink.clone();

    tx.send(Ok(vec![text_update(1, 42, "slow")])).unwrap();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    // Give the loop time to hand the update to a worker, then cancel while it sleeps.
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(done.try_recv().unwrap(), (42, "slow".to_string()));
    assert!(sink.records().is_empty());
}

/// **Test: Work still running after the drain timeout is reported as a timeout.**
#[tokio::test(start_paused = true)]
async fn test_drain_timeout_reported() {
    let config = UpdateLoopConfig {
        drain_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let (h, _done) = harness(Some(Duration::from_secs(3600)), config);
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();
    let sink = h.sink.clone();

    tx.send(Ok(vec![text_update(1, 42, "never ends")])).unwrap();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_timeout);
    assert_eq!(records[0].update_id, None);
}

/// **Test: After a chat worker goes idle and exits, later updates of the chat are still handled in order.**
#[tokio::test(start_paused = true)]
async fn test_idle_worker_restarts() {
    let config = UpdateLoopConfig {
        chat_idle_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (h, mut done) = harness(None, config);
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    tx.send(Ok(vec![text_update(1, 42, "first")])).unwrap();
    recv_n(&mut done, 1).await;

    tokio::time::sleep(Duration::from_secs(30)).await;

    tx.send(Ok(vec![text_update(2, 42, "second"), text_update(3, 42, "third")]))
        .unwrap();
    let records = recv_n(&mut done, 2).await;
    assert_eq!(texts_of(&records, 42), vec!["second", "third"]);

    cancel.cancel();
    run.await.unwrap().unwrap();
}

/// **Test: A handler panic is reported and the chat's later updates are still dispatched.**
#[tokio::test]
async fn test_panicking_handler_keeps_chat_queue() {
    let (h, mut done) = harness_panicking_on(Some("boom"), None, UpdateLoopConfig::default());
    let (tx, source) = ChannelSource::new();
    let cancel = CancellationToken::new();
    let sink = h.sink.clone();

    let run = tokio::spawn({
        let cancel = cancel.clone();
        let bot = h.bot.clone();
        async move { h.update_loop.run(source, bot, cancel).await }
    });

    tx.send(Ok(vec![
        text_update(1, 42, "boom"),
        text_update(2, 42, "after1"),
        text_update(3, 42, "after2"),
    ]))
    .unwrap();

    let records = recv_n(&mut done, 2).await;
    assert_eq!(texts_of(&records, 42), vec!["after1", "after2"]);

    cancel.cancel();
    run.await.unwrap().unwrap();

    let sink_records = sink.records();
    assert_eq!(sink_records.len(), 1);
    assert_eq!(sink_records[0].update_id, Some(1));
    assert!(sink_records[0].error.contains("panicked"));
}
