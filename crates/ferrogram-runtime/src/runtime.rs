//! Bot runtime: one bot, one dispatcher, one delivery mode.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ferrogram_runtime::BotRuntime;
//!
//! let runtime = BotRuntime::builder().profile("production").build()?;
//! runtime.add_route(MessageRoute::new("/start", |_| async { RouteFlow::Stop }));
//! runtime.run().await?;
//! ```
//!
//! The delivery mode comes from the `delivery` section of the
//! configuration: long polling by default, or a webhook server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use ferrogram_core::{Update, WebhookInfo};
use ferrogram_framework::{Dispatcher, MessageRoute};
use ferrogram_transport::{ApiCaller, HttpApiCaller, ServerOptions};

use crate::bot::Bot;
use crate::config::{ConfigLoader, DeliveryConfig, FerrogramConfig, WebhookConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::{PollOptions, UpdatePoller};
use crate::registry::ServerRegistry;
use crate::webhook::{WebhookEndpoint, WebhookOptions};

/// Runs a bot with the delivery mode of its configuration.
pub struct BotRuntime {
    config: FerrogramConfig,
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ServerRegistry>,
    poller: UpdatePoller,
    webhook: WebhookEndpoint,
    running: Mutex<bool>,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Initializes logging from the `logging` section unless a subscriber
    /// is already installed.
    pub fn from_config(config: &FerrogramConfig) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let caller = HttpApiCaller::new(
            &config.bot.api_url,
            config.bot.token.clone(),
            config.bot.request_timeout(),
        )?;
        let runtime = Self::with_caller(config, Arc::new(caller));

        info!(
            log_level = %config.logging.level,
            delivery = runtime.mode(),
            "Runtime initialized from configuration"
        );
        Ok(runtime)
    }

    /// Creates a runtime over an existing caller.
    pub fn with_caller(config: &FerrogramConfig, caller: Arc<dyn ApiCaller>) -> Self {
        let bot = Bot::new(caller);
        let dispatcher = Arc::new(Dispatcher::new());

        let mut poller = UpdatePoller::new(bot.clone(), dispatcher.clone());
        if let DeliveryConfig::Polling(polling) = &config.delivery {
            poller = poller.with_retry(polling.retry.clone());
        }

        let server_options = match &config.delivery {
            DeliveryConfig::Webhook(webhook) => server_options(webhook),
            DeliveryConfig::Polling(_) => ServerOptions::default(),
        };
        let registry = Arc::new(ServerRegistry::new(server_options));
        let webhook = WebhookEndpoint::new(
            bot.clone(),
            dispatcher.clone(),
            registry.clone(),
            config.bot.token.clone(),
        );

        Self {
            config: config.clone(),
            bot,
            dispatcher,
            registry,
            poller,
            webhook,
            running: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &FerrogramConfig {
        &self.config
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Appends a routing rule.
    pub fn add_route(&self, route: MessageRoute) {
        self.dispatcher.add_route(route);
    }

    /// Appends several routing rules, in order.
    pub fn add_routes(&self, routes: impl IntoIterator<Item = MessageRoute>) {
        for route in routes {
            self.dispatcher.add_route(route);
        }
    }

    /// Subscribes to every received update.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Update>> {
        self.dispatcher.subscribe()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn mode(&self) -> &'static str {
        match self.config.delivery {
            DeliveryConfig::Polling(_) => "polling",
            DeliveryConfig::Webhook(_) => "webhook",
        }
    }

    /// Starts delivering updates.
    ///
    /// Returns the webhook status in webhook mode.
    pub async fn start(&self) -> RuntimeResult<Option<WebhookInfo>> {
        {
            let mut running = self.running.lock();
            if *running {
                warn!("Runtime is already running");
                return Ok(None);
            }
            *running = true;
        }

        let result = match &self.config.delivery {
            DeliveryConfig::Polling(polling) => {
                self.poller.start(PollOptions::from(polling)).await;
                Ok(None)
            }
            DeliveryConfig::Webhook(webhook) => self.start_webhook(webhook).await.map(Some),
        };

        match &result {
            Ok(_) => info!(delivery = self.mode(), "Runtime started"),
            Err(e) => {
                error!(error = %e, "Failed to start delivery");
                *self.running.lock() = false;
            }
        }
        result
    }

    async fn start_webhook(&self, config: &WebhookConfig) -> RuntimeResult<WebhookInfo> {
        let options = WebhookOptions::from_config(config)?;
        let info = self.webhook.configure(&options).await?;
        if let Some(message) = &info.last_error_message {
            warn!(message = %message, "Remote side reports a webhook error");
        }
        Ok(info)
    }

    /// Stops delivering updates.
    ///
    /// The webhook stays registered remotely; a later polling start
    /// deletes it.
    pub async fn stop(&self) {
        {
            let mut running = self.running.lock();
            if !*running {
                warn!("Runtime is not running");
                return;
            }
            *running = false;
        }

        self.poller.stop(true).await;
        self.registry.clear().await;
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Bot is running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await;
        Ok(())
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

impl std::fmt::Debug for BotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRuntime")
            .field("bot", &self.bot)
            .field("delivery", &self.mode())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn server_options(webhook: &WebhookConfig) -> ServerOptions {
    ServerOptions {
        inactivity_timeout: Duration::from_millis(webhook.inactivity_timeout_ms),
        request_timeout: Duration::from_millis(webhook.request_timeout_ms),
        handshake_timeout: Duration::from_millis(webhook.handshake_timeout_ms),
        ..ServerOptions::default()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Cannot listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builds a [`BotRuntime`] from layered configuration.
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .config_file("config/production.toml")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Loads this file instead of searching for one.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Overrides loaded values, e.g. with command-line flags.
    pub fn merge(mut self, overrides: impl serde::Serialize) -> Self {
        self.config_loader = self.config_loader.merge(overrides);
        self
    }

    pub fn build(self) -> RuntimeResult<BotRuntime> {
        let config = self.config_loader.load().map_err(RuntimeError::Config)?;
        BotRuntime::from_config(&config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
