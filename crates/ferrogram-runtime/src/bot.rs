//! Typed request helpers over an [`ApiCaller`].
//!
//! ```rust,ignore
//! let bot = Bot::new(Arc::new(HttpApiCaller::new(DEFAULT_API_URL, token, timeout)?));
//! let me = bot.get_me().await?;
//! bot.send_message(chat_id, "*hi*", &SendOptions::new().flags(SendFlag::Markdown))
//!     .await?;
//! ```
//!
//! Anything without a helper goes through [`Bot::call`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use ferrogram_core::{
    ApiResult, ChatAction, ChatId, File, InputFile, Message, MessageRef, Params, ReplyMarkup,
    SendFlags, UpdateKinds, User, WebhookInfo,
};
use ferrogram_transport::ApiCaller;

// =============================================================================
// Options
// =============================================================================

/// Options shared by the send helpers.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub flags: SendFlags,
    pub reply_to_message_id: Option<i64>,
    pub reply_markup: Option<ReplyMarkup>,
    /// Caption of photos and documents.
    pub caption: Option<String>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: impl Into<SendFlags>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn reply_to(mut self, message_id: i64) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }

    pub fn markup(mut self, markup: impl Into<ReplyMarkup>) -> Self {
        self.reply_markup = Some(markup.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    fn apply(&self, params: &mut Params) {
        self.flags.apply_formatting(params);
        self.flags.apply_notification(params);
        params.push_opt("reply_to_message_id", self.reply_to_message_id);
        params.push_markup(self.reply_markup.as_ref());
    }
}

/// Reply to a callback query.
#[derive(Debug, Clone, Default)]
pub struct CallbackAnswer {
    pub text: Option<String>,
    /// Show `text` as an alert instead of a notification.
    pub show_alert: bool,
    pub url: Option<String>,
    /// Seconds the client may cache the answer; `0` leaves it unset.
    pub cache_time: u32,
}

/// Arguments of `setWebhook`.
#[derive(Debug, Clone, Default)]
pub struct WebhookRegistration {
    pub url: String,
    /// Public key certificate, uploaded for self-signed setups.
    pub certificate: Option<InputFile>,
    pub max_connections: Option<u32>,
    pub allowed_updates: UpdateKinds,
}

// =============================================================================
// Bot
// =============================================================================

/// A bot account bound to one [`ApiCaller`].
#[derive(Clone)]
pub struct Bot {
    caller: Arc<dyn ApiCaller>,
}

impl Bot {
    pub fn new(caller: Arc<dyn ApiCaller>) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &Arc<dyn ApiCaller> {
        &self.caller
    }

    /// Calls any remote method and returns the envelope's `result`.
    pub async fn call(&self, method: &str, params: Params) -> ApiResult<Value> {
        self.caller.call(method, params).await
    }

    /// Calls any remote method and decodes its `result` into `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Params) -> ApiResult<T> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_me(&self) -> ApiResult<User> {
        self.call_as("getMe", Params::new()).await
    }

    pub async fn send_message(
        &self,
        chat_id: impl Into<ChatId>,
        text: &str,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        let mut params = Params::new()
            .with("chat_id", chat_id.into())
            .with("text", text);
        options.apply(&mut params);
        self.call_as("sendMessage", params).await
    }

    /// Edits a message's text.
    ///
    /// Returns the edited message, or `None` for inline messages, for which
    /// the remote API only answers `true`. Only inline keyboards can be
    /// attached to an edit; other markup is dropped.
    pub async fn edit_message_text(
        &self,
        target: &MessageRef,
        text: &str,
        options: &SendOptions,
    ) -> ApiResult<Option<Message>> {
        let mut params = Params::new();
        target.apply(&mut params);
        params.push("text", text);
        options.flags.apply_formatting(&mut params);
        match &options.reply_markup {
            Some(markup) if markup.is_inline() => params.push_markup(Some(markup)),
            Some(_) => warn!("Only inline keyboards can be attached to an edit, dropping markup"),
            None => {}
        }

        let value = self.call("editMessageText", params).await?;
        if value.is_object() {
            Ok(Some(serde_json::from_value(value)?))
        } else {
            Ok(None)
        }
    }

    pub async fn delete_message(&self, chat_id: impl Into<ChatId>, message_id: i64) -> ApiResult<bool> {
        let params = Params::new()
            .with("chat_id", chat_id.into())
            .with("message_id", message_id);
        self.call_as("deleteMessage", params).await
    }

    pub async fn forward_message(
        &self,
        chat_id: impl Into<ChatId>,
        from_chat_id: impl Into<ChatId>,
        message_id: i64,
        flags: SendFlags,
    ) -> ApiResult<Message> {
        let mut params = Params::new()
            .with("chat_id", chat_id.into())
            .with("from_chat_id", from_chat_id.into())
            .with("message_id", message_id);
        flags.apply_notification(&mut params);
        self.call_as("forwardMessage", params).await
    }

    pub async fn send_chat_action(&self, chat_id: impl Into<ChatId>, action: ChatAction) -> ApiResult<bool> {
        let params = Params::new()
            .with("chat_id", chat_id.into())
            .with("action", action);
        self.call_as("sendChatAction", params).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str, answer: &CallbackAnswer) -> ApiResult<bool> {
        let mut params = Params::new().with("callback_query_id", callback_query_id);
        params.push_opt("text", answer.text.as_deref());
        params.push_flag("show_alert", answer.show_alert);
        params.push_opt("url", answer.url.as_deref());
        params.push_opt("cache_time", Some(answer.cache_time).filter(|t| *t > 0));
        self.call_as("answerCallbackQuery", params).await
    }

    /// Sends a photo: uploaded from bytes or a path, or passed by URL or id.
    pub async fn send_photo(
        &self,
        chat_id: impl Into<ChatId>,
        photo: InputFile,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        self.send_file("sendPhoto", "photo", chat_id.into(), photo, options)
            .await
    }

    /// Sends a general file: uploaded from bytes or a path, or passed by URL or id.
    pub async fn send_document(
        &self,
        chat_id: impl Into<ChatId>,
        document: InputFile,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        self.send_file("sendDocument", "document", chat_id.into(), document, options)
            .await
    }

    async fn send_file(
        &self,
        method: &str,
        field: &str,
        chat_id: ChatId,
        file: InputFile,
        options: &SendOptions,
    ) -> ApiResult<Message> {
        let mut params = Params::new().with("chat_id", chat_id);
        params.push_file(field, file);
        params.push_opt("caption", options.caption.as_deref());
        options.apply(&mut params);
        self.call_as(method, params).await
    }

    /// Looks up a file and fills in its absolute download link.
    pub async fn get_file(&self, file_id: &str) -> ApiResult<File> {
        let mut file: File = self
            .call_as("getFile", Params::new().with("file_id", file_id))
            .await?;
        file.link = file
            .file_path
            .as_deref()
            .and_then(|path| self.caller.file_link(path));
        Ok(file)
    }

    pub async fn set_webhook(&self, registration: WebhookRegistration) -> ApiResult<bool> {
        let mut params = Params::new().with("url", &registration.url);
        params.push_opt("max_connections", registration.max_connections);
        params.push_opt(
            "allowed_updates",
            registration.allowed_updates.to_allowed_updates(),
        );
        if let Some(certificate) = registration.certificate {
            params.push_file("certificate", certificate);
        }
        debug!(url = %redact_url(&registration.url), "Setting webhook");
        self.call_as("setWebhook", params).await
    }

    pub async fn delete_webhook(&self) -> ApiResult<bool> {
        self.call_as("deleteWebhook", Params::new()).await
    }

    pub async fn get_webhook_info(&self) -> ApiResult<WebhookInfo> {
        self.call_as("getWebhookInfo", Params::new()).await
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot").finish_non_exhaustive()
    }
}

/// Drops the secret path of a webhook URL.
fn redact_url(url: &str) -> &str {
    url.rfind('/').map_or(url, |i| &url[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCaller;
    use ferrogram_core::{ApiError, InlineKeyboardButton, SendFlag, UpdateKind};

    fn bot() -> (Bot, Arc<MockCaller>) {
        let caller = Arc::new(MockCaller::new());
        (Bot::new(caller.clone()), caller)
    }

    const MESSAGE: &str = r#"{"ok":true,"result":{"message_id":5,"date":0,"chat":{"id":1,"type":"private"},"text":"hi"}}"#;

    #[tokio::test]
    async fn test_send_message_with_markdown_and_keyboard() {
        let (bot, caller) = bot();
        caller.respond("sendMessage", MESSAGE);

        let keyboard = vec![
            vec![
                InlineKeyboardButton::callback("A", "a"),
                InlineKeyboardButton::callback("B", "b"),
            ],
            vec![
                InlineKeyboardButton::url("C", "http://x"),
                InlineKeyboardButton::callback("D", "d"),
            ],
        ];
        let options = SendOptions::new()
            .flags(SendFlag::Markdown | SendFlag::DisableNotification)
            .reply_to(3)
            .markup(keyboard);
        let message = bot.send_message(1i64, "*hi*", &options).await.unwrap();
        assert_eq!(message.message_id, 5);

        let params = &caller.calls_to("sendMessage")[0];
        assert_eq!(params.get("chat_id"), Some("1"));
        assert_eq!(params.get("parse_mode"), Some("Markdown"));
        assert_eq!(params.get("disable_notification"), Some("true"));
        assert_eq!(params.get("reply_to_message_id"), Some("3"));
        assert_eq!(
            params.get("reply_markup"),
            Some(
                r#"{"inline_keyboard":[[{"text":"A","callback_data":"a"},{"text":"B","callback_data":"b"}],[{"text":"C","url":"http://x"},{"text":"D","callback_data":"d"}]]}"#
            )
        );
    }

    #[tokio::test]
    async fn test_remote_error_is_returned() {
        let (bot, caller) = bot();
        caller.respond(
            "sendMessage",
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        );
        let err = bot
            .send_message("@nowhere", "x", &SendOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote { code: 400, .. }));
    }

    #[tokio::test]
    async fn test_photo_upload_or_reference() {
        let (bot, caller) = bot();
        caller.respond("sendPhoto", MESSAGE);
        caller.respond("sendPhoto", MESSAGE);

        bot.send_photo(1i64, InputFile::bytes("a.png", vec![1, 2, 3]), &SendOptions::new().caption("pic"))
            .await
            .unwrap();
        bot.send_photo(1i64, InputFile::FileId("AgAD".into()), &SendOptions::new())
            .await
            .unwrap();

        let calls = caller.calls_to("sendPhoto");
        assert!(calls[0].has_uploads());
        assert_eq!(calls[0].get("photo"), None);
        assert_eq!(calls[0].get("caption"), Some("pic"));
        assert!(!calls[1].has_uploads());
        assert_eq!(calls[1].get("photo"), Some("AgAD"));
    }

    #[tokio::test]
    async fn test_get_file_fills_link() {
        let (bot, caller) = bot();
        caller.respond(
            "getFile",
            r#"{"ok":true,"result":{"file_id":"f1","file_path":"photos/file_1.jpg"}}"#,
        );
        let file = bot.get_file("f1").await.unwrap();
        assert_eq!(file.link.as_deref(), Some("https://files.test/photos/file_1.jpg"));
    }

    #[tokio::test]
    async fn test_edit_inline_message_answers_none() {
        let (bot, caller) = bot();
        let edited = bot
            .edit_message_text(
                &MessageRef::Inline("im".into()),
                "new",
                &SendOptions::new().markup(ReplyMarkup::ForceReply { selective: false }),
            )
            .await
            .unwrap();
        assert!(edited.is_none());

        let params = &caller.calls_to("editMessageText")[0];
        assert_eq!(params.get("inline_message_id"), Some("im"));
        assert_eq!(params.get("reply_markup"), None);
    }

    #[tokio::test]
    async fn test_set_webhook_parameters() {
        let (bot, caller) = bot();
        let accepted = bot
            .set_webhook(WebhookRegistration {
                url: "https://hook.test:8443/123:abc".into(),
                certificate: Some(InputFile::bytes("cert.pem", b"PEM".to_vec())),
                max_connections: Some(10),
                allowed_updates: UpdateKinds::from(UpdateKind::Message),
            })
            .await
            .unwrap();
        assert!(accepted);

        let params = &caller.calls_to("setWebhook")[0];
        assert_eq!(params.get("url"), Some("https://hook.test:8443/123:abc"));
        assert_eq!(params.get("max_connections"), Some("10"));
        assert_eq!(params.get("allowed_updates"), Some(r#"["message"]"#));
        assert_eq!(params.uploads().len(), 1);
        assert_eq!(redact_url("https://hook.test:8443/123:abc"), "https://hook.test:8443");
    }

    #[tokio::test]
    async fn test_callback_answer_skips_unset_fields() {
        let (bot, caller) = bot();
        bot.answer_callback_query("cb", &CallbackAnswer::default())
            .await
            .unwrap();
        let params = &caller.calls_to("answerCallbackQuery")[0];
        assert_eq!(params.iter().count(), 1);
        assert_eq!(params.get("callback_query_id"), Some("cb"));
    }
}
