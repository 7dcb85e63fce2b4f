//! Long-poll delivery.
//!
//! ```text
//! start ─▶ deleteWebhook ─▶ getUpdates(offset, limit, timeout, allowed_updates)
//!                                 │                       ▲
//!                                 ▼                       │
//!                      Dispatcher::process ── cursor = max id + 1
//!                                 │
//!                        failure: back off, then retry
//! ```
//!
//! At most one `getUpdates` call is outstanding. A batch is fully
//! dispatched before the next call is issued.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use ferrogram_core::{Params, RetryConfig, UpdateKinds};
use ferrogram_framework::Dispatcher;

use crate::bot::Bot;
use crate::config::PollingConfig;

/// Parameters of a polling session.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOptions {
    /// Seconds the remote side may hold each call open.
    pub timeout: u32,
    /// Maximum updates per batch (1 to 100).
    pub limit: u32,
    /// Kinds to receive; empty receives the remote default.
    pub allowed: UpdateKinds,
    /// Offset of the first call; later calls follow the cursor.
    pub offset: Option<i64>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: 30,
            limit: 100,
            allowed: UpdateKinds::empty(),
            offset: None,
        }
    }
}

impl From<&PollingConfig> for PollOptions {
    fn from(config: &PollingConfig) -> Self {
        Self {
            timeout: config.timeout_secs,
            limit: config.limit,
            allowed: config.allowed_updates,
            offset: None,
        }
    }
}

impl PollOptions {
    fn params(&self, offset: Option<i64>) -> Params {
        let mut params = Params::new();
        params.push_opt("offset", offset);
        params.push("limit", self.limit);
        params.push("timeout", self.timeout);
        params.push_opt("allowed_updates", self.allowed.to_allowed_updates());
        params
    }
}

/// A running poll loop.
struct PollTask {
    /// Aborts the in-flight call.
    abort: CancellationToken,
    /// Ends the loop once the in-flight call completes.
    finish: CancellationToken,
    handle: JoinHandle<()>,
}

/// Feeds `getUpdates` batches into a [`Dispatcher`].
pub struct UpdatePoller {
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    retry: RetryConfig,
    task: Mutex<Option<PollTask>>,
}

impl UpdatePoller {
    pub fn new(bot: Bot, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            bot,
            dispatcher,
            retry: RetryConfig::default(),
            task: Mutex::new(None),
        }
    }

    /// Sets the backoff applied after failed calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Starts polling, replacing any running loop.
    ///
    /// Any webhook of the bot is deleted first; the remote API refuses
    /// `getUpdates` while one is set. A failed deletion is logged and
    /// polling starts anyway.
    pub async fn start(&self, options: PollOptions) {
        self.stop(true).await;

        match self.bot.delete_webhook().await {
            Ok(_) => debug!("Webhook deleted before polling"),
            Err(e) => warn!(error = %e, "Cannot delete webhook, polling anyway"),
        }

        let abort = CancellationToken::new();
        let finish = CancellationToken::new();
        let cursor = options
            .offset
            .or_else(|| self.dispatcher.last_update_id().map(next_offset));
        let poll_loop = PollLoop {
            bot: self.bot.clone(),
            dispatcher: self.dispatcher.clone(),
            retry: self.retry.clone(),
            options,
            cursor,
        };
        info!(
            timeout = poll_loop.options.timeout,
            limit = poll_loop.options.limit,
            offset = ?cursor,
            "Polling started"
        );
        let handle = tokio::spawn(poll_loop.run(abort.clone(), finish.clone()));

        *self.task.lock() = Some(PollTask {
            abort,
            finish,
            handle,
        });
    }

    /// Stops polling and waits for the loop to end.
    ///
    /// With `instantly` the in-flight call is abandoned; otherwise it
    /// completes and its batch is dispatched first.
    pub async fn stop(&self, instantly: bool) {
        let Some(task) = self.task.lock().take() else {
            return;
        };
        if instantly {
            task.abort.cancel();
        } else {
            task.finish.cancel();
        }
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Poll task ended abnormally");
        }
        info!(instantly, "Polling stopped");
    }
}

impl Drop for UpdatePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort.cancel();
        }
    }
}

impl std::fmt::Debug for UpdatePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePoller")
            .field("running", &self.is_running())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn next_offset(update_id: u64) -> i64 {
    i64::try_from(update_id).map_or(i64::MAX, |id| id.saturating_add(1))
}

struct PollLoop {
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    retry: RetryConfig,
    options: PollOptions,
    cursor: Option<i64>,
}

impl PollLoop {
    async fn run(mut self, abort: CancellationToken, finish: CancellationToken) {
        let mut backoff = self.retry.backoff();

        while !finish.is_cancelled() {
            let params = self.options.params(self.cursor);
            let caller = self.bot.caller().clone();
            let response = tokio::select! {
                () = abort.cancelled() => break,
                response = caller.call_raw("getUpdates", params) => response,
            };

            let failure = match response {
                Ok(body) => match self.dispatcher.process(&body, false).await {
                    Ok(outcome) => {
                        if let Some(max) = outcome.max_update_id {
                            self.cursor = Some(next_offset(max));
                        }
                        trace!(
                            dispatched = outcome.dispatched,
                            offset = ?self.cursor,
                            "Poll completed"
                        );
                        backoff.reset();
                        None
                    }
                    Err(e) => Some(e.to_string()),
                },
                Err(e) => Some(e.to_string()),
            };

            if let Some(error) = failure {
                let delay = backoff.next_delay();
                warn!(error = %error, delay_ms = millis(delay), "Poll failed, backing off");
                tokio::select! {
                    () = abort.cancelled() => break,
                    () = finish.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
        debug!("Poll loop finished");
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
