//! # Ferrogram
//!
//! A Telegram bot API client with a built-in webhook server.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────┐
//! getUpdates ───▶│ UpdatePoller     │──┐
//!                └──────────────────┘  │   ┌────────────┐     ┌─────────────────┐
//!                                      ├──▶│ Dispatcher │──┬─▶│ broadcast stream│
//!                ┌──────────────────┐  │   └────────────┘  │  └─────────────────┘
//! HTTPS POST ───▶│ WebhookEndpoint  │──┘                   └─▶│ MessageRoute... │
//!                │ (TLS, allow-list)│                         └─────────────────┘
//!                └──────────────────┘
//! ```
//!
//! - **Runtime**: picks the delivery mode from configuration and runs it
//! - **Dispatcher**: decodes bodies, tracks the update cursor, publishes
//!   every update and runs prefix routes in order
//! - **Bot**: typed helpers over the generic `call` primitive
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::builder().build()?;
//!     let bot = runtime.bot().clone();
//!
//!     runtime.add_route(MessageRoute::new("/ping", move |update: Arc<Update>| {
//!         let bot = bot.clone();
//!         async move {
//!             if let Some(message) = update.message() {
//!                 let _ = bot.send_message(message.chat.id, "pong", &SendOptions::new()).await;
//!             }
//!             RouteFlow::Stop
//!         }
//!     }));
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use ferrogram_core as core;
pub use ferrogram_framework as framework;
pub use ferrogram_runtime as runtime;
pub use ferrogram_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ferrogram::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use ferrogram_runtime::{BotRuntime, RuntimeBuilder};

    // Bot helpers
    pub use ferrogram_runtime::{Bot, CallbackAnswer, SendOptions};

    // Routing
    pub use ferrogram_framework::{Dispatcher, MessageRoute, RouteFlow};

    // Data model
    pub use ferrogram_core::{
        CallbackQuery, ChatAction, ChatId, InlineKeyboardButton, InlineMenu, InputFile, Message,
        MessageRef, ReplyMarkup, SendFlag, SendFlags, Update, UpdateKind, UpdateKinds,
        UpdatePayload,
    };

    // Delivery, for running without the runtime
    pub use ferrogram_runtime::{
        PollOptions, ServerRegistry, UpdatePoller, WebhookEndpoint, WebhookOptions,
    };
}
