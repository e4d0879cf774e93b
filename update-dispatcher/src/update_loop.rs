//! Update loop: pulls batches from an [`UpdateSource`], keeps per-chat delivery order, supports
//! cooperative cancellation and a bounded drain of in-flight work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dbot_core::{Bot, DbotError, PollError, Result, Update, UpdateSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatcher::Dispatcher;

/// Tuning of the update loop.
#[derive(Debug, Clone)]
pub struct UpdateLoopConfig {
    /// How long in-flight dispatches may run after cancellation before the drain is reported as timed out.
    pub drain_timeout: Duration,
    /// Pause after a recoverable poll error before polling again.
    pub poll_error_delay: Duration,
    /// A chat worker with no update for this long exits; the next update of the chat starts a new one.
    pub chat_idle_timeout: Duration,
}

impl Default for UpdateLoopConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
            poll_error_delay: Duration::from_secs(1),
            chat_idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Queue feeding the worker of one chat.
struct ChatQueue {
    tx: mpsc::UnboundedSender<Update>,
    worker: JoinHandle<()>,
}

/// Runs the dispatcher over an update feed. Updates of one chat are dispatched one at a time in
/// delivery order by that chat's worker task; different chats run concurrently.
pub struct UpdateLoop {
    dispatcher: Arc<Dispatcher>,
    config: UpdateLoopConfig,
}

impl UpdateLoop {
    pub fn new(dispatcher: Arc<Dispatcher>, config: UpdateLoopConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Polls until `cancel` fires or the source reports a fatal error, then stops accepting updates and
    /// waits up to `drain_timeout` for queued and in-flight updates.
    ///
    /// Returns the fatal poll error, if any. Recoverable poll errors are reported to the exception sink
    /// and polling continues.
    #[instrument(skip_all)]
    pub async fn run<S: UpdateSource>(
        &self,
        mut source: S,
        bot: Arc<dyn Bot>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let tracker = TaskTracker::new();
        let mut chats: HashMap<i64, ChatQueue> = HashMap::new();
        info!("step: update loop started");

        let result = loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                batch = source.next_batch() => batch,
            };

            match batch {
                Ok(updates) => {
                    if !updates.is_empty() {
                        debug!(count = updates.len(), "step: received updates");
                    }
                    for update in updates {
                        self.enqueue(&mut chats, &tracker, &bot, update);
                    }
                    // A finished worker has an empty, closed queue.
                    chats.retain(|_, queue| !queue.worker.is_finished());
                }
                Err(PollError::Fatal(e)) => {
                    error!(error = %e, "Fatal poll error, stopping update loop");
                    self.dispatcher.sink().handle(&e, bot.as_ref(), None).await;
                    break Err(e);
                }
                Err(PollError::Recoverable(e)) => {
                    warn!(error = %e, "Poll error, continuing");
                    self.dispatcher.sink().handle(&e, bot.as_ref(), None).await;
                    tokio::select! {
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.config.poll_error_delay) => {}
                    }
                }
            }
        };

        info!(chats = chats.len(), "step: update loop stopping, draining in-flight updates");
        // Dropping the senders lets every worker finish its queue and exit.
        drop(chats);
        tracker.close();
        self.drain(&tracker, &bot).await;
        result
    }

    fn enqueue(
        &self,
        chats: &mut HashMap<i64, ChatQueue>,
        tracker: &TaskTracker,
        bot: &Arc<dyn Bot>,
        update: Update,
    ) {
        let chat_id = update.chat_id;
        let (update, previous) = match chats.remove(&chat_id) {
            Some(queue) => match queue.tx.send(update) {
                Ok(()) => {
                    chats.insert(chat_id, queue);
                    return;
                }
                // Worker went idle and closed its queue; the new worker waits for it to finish.
                Err(mpsc::error::SendError(returned)) => (returned, Some(queue.worker)),
            },
            None => (update, None),
        };
        self.spawn_worker(chats, tracker, bot, update, previous);
    }

    fn spawn_worker(
        &self,
        chats: &mut HashMap<i64, ChatQueue>,
        tracker: &TaskTracker,
        bot: &Arc<dyn Bot>,
        first: Update,
        previous: Option<JoinHandle<()>>,
    ) {
        let chat_id = first.chat_id;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tracker.spawn(chat_worker(
            self.dispatcher.clone(),
            bot.clone(),
            first,
            rx,
            previous,
            self.config.chat_idle_timeout,
        ));
        debug!(chat_id = chat_id, "step: chat worker started");
        chats.insert(chat_id, ChatQueue { tx, worker });
    }

    async fn drain(&self, tracker: &TaskTracker, bot: &Arc<dyn Bot>) {
        let limit = self.config.drain_timeout;
        if tokio::time::timeout(limit, tracker.wait()).await.is_err() {
            let e = DbotError::Timeout(format!(
                "{} chat workers still running {:?} after shutdown",
                tracker.len(),
                limit
            ));
            warn!(error = %e, "Drain timed out");
            self.dispatcher.sink().handle(&e, bot.as_ref(), None).await;
        } else {
            info!("step: update loop drained");
        }
    }
}

/// Dispatches the updates of one chat sequentially.
async fn chat_worker(
    dispatcher: Arc<Dispatcher>,
    bot: Arc<dyn Bot>,
    first: Update,
    mut rx: mpsc::UnboundedReceiver<Update>,
    previous: Option<JoinHandle<()>>,
    idle_timeout: Duration,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            error!(error = %e, "Previous chat worker panicked");
        }
    }

    dispatcher.dispatch(bot.clone(), first).await;
    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(update)) => {
                dispatcher.dispatch(bot.clone(), update).await;
            }
            Ok(None) => break,
            Err(_) => {
                rx.close();
                // Updates that arrived before close still belong to this worker.
                while let Ok(update) = rx.try_recv() {
                    dispatcher.dispatch(bot.clone(), update).await;
                }
                break;
            }
        }
    }
}
