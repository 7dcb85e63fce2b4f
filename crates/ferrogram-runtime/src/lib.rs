//! Ferrogram Runtime - update delivery and orchestration.
//!
//! This crate provides:
//! - Typed API helpers (`Bot`)
//! - Long-poll delivery (`UpdatePoller`)
//! - Webhook delivery (`WebhookEndpoint`) over servers shared per port
//!   (`ServerRegistry`)
//! - Runtime orchestration (`BotRuntime`)
//! - Configuration loading and logging setup
//!
//! ```ignore
//! use ferrogram_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Loads ferrogram.toml and FERROGRAM_* variables
//!     let runtime = BotRuntime::builder().build()?;
//!
//!     let mut updates = runtime.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(update) = updates.recv().await {
//!             tracing::info!(update_id = update.update_id, "update");
//!         }
//!     });
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Delivery modes
//!
//! | Mode | Source | Cursor |
//! |------|--------|--------|
//! | polling | one outstanding `getUpdates` call | highest `update_id` + 1 |
//! | webhook | TLS server, route `/{token}` on the certificate's host | not needed |
//!
//! Starting the poller deletes any webhook first; the remote API serves
//! only one mode at a time.

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod registry;
pub mod runtime;
pub mod webhook;

#[cfg(test)]
mod mock;

// Re-exports
pub use bot::{Bot, CallbackAnswer, SendOptions, WebhookRegistration};
pub use config::{ConfigError, ConfigLoader, ConfigResult, FerrogramConfig};
pub use error::{RuntimeError, RuntimeResult, WebhookError, WebhookResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{PollOptions, UpdatePoller};
pub use registry::ServerRegistry;
pub use runtime::{BotRuntime, RuntimeBuilder};
pub use webhook::{PUBLISHED_RANGES, WebhookEndpoint, WebhookOptions, published_allow_list};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
