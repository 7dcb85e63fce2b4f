//! Echo Bot Example
//!
//! A small bot driven by `ferrogram.toml`, `FERROGRAM_*` variables and
//! command-line flags.
//!
//! # Routes
//!
//! Routes are tried in registration order; each one stops dispatch once it
//! has answered:
//!
//! ```text
//! /ping          → "pong"
//! /echo <text>   → <text>, as a reply
//! /menu          → paged inline menu of colors
//! color..<page>  → (callback) flips the menu page
//! color.<name>   → (callback) toast "You picked <name>"
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --token 123:abc
//! FERROGRAM_PROFILE=production cargo run --package echo-bot
//! ```

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ferrogram::framework::RouteHandler;
use ferrogram::prelude::*;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

const COLORS: [&str; 6] = ["red", "green", "blue", "cyan", "magenta", "yellow"];

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo bot for the ferrogram client")]
struct Args {
    /// Configuration file; searched for when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, overriding the configuration.
    #[arg(long)]
    token: Option<String>,
}

fn color_menu() -> InlineMenu {
    InlineMenu::new(COLORS, "color.{}").columns(2).page_size(4)
}

/// Binds a handler taking the bot to a route.
fn with_bot<F, Fut>(bot: &Bot, handler: F) -> impl RouteHandler + 'static
where
    F: Fn(Bot, Arc<Update>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RouteFlow> + Send + 'static,
{
    let bot = bot.clone();
    move |update: Arc<Update>| handler(bot.clone(), update)
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn ping(bot: Bot, update: Arc<Update>) -> RouteFlow {
    if let Some(message) = update.message()
        && let Err(e) = bot
            .send_message(message.chat.id, "pong", &SendOptions::new())
            .await
    {
        error!(error = %e, "Failed to send ping reply");
    }
    RouteFlow::Stop
}

async fn echo(bot: Bot, update: Arc<Update>) -> RouteFlow {
    let Some(message) = update.message() else {
        return RouteFlow::Continue;
    };
    let content = message
        .text
        .as_deref()
        .and_then(|text| text.strip_prefix("/echo"))
        .map(str::trim)
        .unwrap_or_default();

    let (text, options) = if content.is_empty() {
        ("Usage: /echo <text>", SendOptions::new())
    } else {
        (content, SendOptions::new().reply_to(message.message_id))
    };
    if let Err(e) = bot.send_message(message.chat.id, text, &options).await {
        error!(error = %e, "Failed to send echo reply");
    }
    RouteFlow::Stop
}

async fn menu(bot: Bot, update: Arc<Update>) -> RouteFlow {
    let Some(message) = update.message() else {
        return RouteFlow::Continue;
    };
    let _ = bot.send_chat_action(message.chat.id, ChatAction::Typing).await;
    let options = SendOptions::new().markup(ReplyMarkup::inline(color_menu().build(0)));
    if let Err(e) = bot
        .send_message(message.chat.id, "Pick a color", &options)
        .await
    {
        error!(error = %e, "Failed to send menu");
    }
    RouteFlow::Stop
}

async fn turn_page(bot: Bot, update: Arc<Update>) -> RouteFlow {
    let Some(query) = update.callback_query() else {
        return RouteFlow::Continue;
    };
    let page = query
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix("color.."))
        .and_then(|page| page.parse().ok())
        .unwrap_or(0);

    let target = match (&query.message, &query.inline_message_id) {
        (Some(message), _) => MessageRef::chat(message.chat.id, message.message_id),
        (None, Some(id)) => MessageRef::Inline(id.clone()),
        (None, None) => return RouteFlow::Stop,
    };
    let options = SendOptions::new().markup(ReplyMarkup::inline(color_menu().build(page)));
    if let Err(e) = bot
        .edit_message_text(&target, "Pick a color", &options)
        .await
    {
        error!(error = %e, page, "Failed to turn menu page");
    }
    let _ = bot
        .answer_callback_query(&query.id, &CallbackAnswer::default())
        .await;
    RouteFlow::Stop
}

async fn pick(bot: Bot, update: Arc<Update>) -> RouteFlow {
    let Some(query) = update.callback_query() else {
        return RouteFlow::Continue;
    };
    let color = query
        .data
        .as_deref()
        .and_then(|data| data.strip_prefix("color."))
        .unwrap_or("nothing");
    let answer = CallbackAnswer {
        text: Some(format!("You picked {color}")),
        ..CallbackAnswer::default()
    };
    if let Err(e) = bot.answer_callback_query(&query.id, &answer).await {
        error!(error = %e, "Failed to answer callback query");
    }
    RouteFlow::Stop
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = BotRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    if let Some(token) = &args.token {
        builder = builder.merge(json!({ "bot": { "token": token } }));
    }
    let runtime = builder.build()?;

    let bot = runtime.bot().clone();
    let me = bot.get_me().await?;
    info!(id = me.id, username = ?me.username, "Logged in");

    let messages = UpdateKinds::from(UpdateKind::Message);
    let callbacks = UpdateKinds::from(UpdateKind::CallbackQuery);
    runtime.add_routes([
        MessageRoute::new("/ping", with_bot(&bot, ping)).kinds(messages),
        MessageRoute::new("/echo", with_bot(&bot, echo)).kinds(messages),
        MessageRoute::new("/menu", with_bot(&bot, menu)).kinds(messages),
        MessageRoute::new("color..", with_bot(&bot, turn_page)).kinds(callbacks),
        MessageRoute::new("color.", with_bot(&bot, pick)).kinds(callbacks),
    ]);

    // Every update, routed or not
    let mut updates = runtime.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    info!(update_id = update.update_id, kind = ?update.kind(), "Update received");
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "Update log lagging behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    runtime.run().await?;

    Ok(())
}
