//! Typed records decoded from API documents.
//!
//! Only the fields the update pipeline and the typed helpers touch are
//! modelled; everything else in a document is ignored. Optional fields
//! default when absent so that partial documents still decode.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A private chat, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A formatting or link entity inside message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: u32,
    pub length: u32,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

/// Fields shared by every message-like record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub date: i64,
    pub chat: Chat,
}

/// A message, edited message, channel post or edited channel post.
///
/// `Deref` → [`MessageHeader`], so `msg.chat` and `msg.message_id` work
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub header: MessageHeader,

    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    pub forward_from: Option<User>,
    #[serde(default)]
    pub edit_date: Option<i64>,
    #[serde(default)]
    pub author_signature: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl Deref for Message {
    type Target = MessageHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

impl Message {
    /// Text or, for media messages, the caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// An incoming inline query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub location: Option<Location>,
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

/// An inline result chosen by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub inline_message_id: Option<String>,
    pub query: String,
}

/// A press on an inline keyboard button.
///
/// The callback query owns the message the button was attached to; other
/// views of that message (see `Update::message`) borrow it from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub inline_message_id: Option<String>,
    #[serde(default)]
    pub chat_instance: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub game_short_name: Option<String>,
}

/// Current webhook status as reported by `getWebhookInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub has_custom_certificate: bool,
    #[serde(default)]
    pub pending_update_count: u64,
    #[serde(default)]
    pub last_error_date: Option<i64>,
    #[serde(default)]
    pub last_error_message: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub allowed_updates: Vec<String>,
}

/// A file ready to be downloaded, as returned by `getFile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Absolute download link, filled in by the client when requested.
    #[serde(skip)]
    pub link: Option<String>,
}
