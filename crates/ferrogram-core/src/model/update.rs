//! The [`Update`] tagged union and its classification from raw documents.

use serde_json::Value;

use crate::document::Document;
use crate::error::{DecodeError, DecodeResult};
use crate::kinds::UpdateKind;
use crate::model::records::{CallbackQuery, ChosenInlineResult, InlineQuery, Message};

/// The single populated payload of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
    /// The document carried none of the known payload keys.
    Undefined,
}

/// One event delivered by the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Server-assigned, monotonically increasing identifier.
    pub update_id: u64,
    pub payload: UpdatePayload,
}

impl Update {
    /// Classifies and decodes one update document.
    ///
    /// The payload variant is chosen by the first well-known key present, in
    /// wire order. `update_id` is required; a document with none of the known
    /// keys decodes to [`UpdatePayload::Undefined`].
    pub fn from_document(value: &Value) -> DecodeResult<Self> {
        let doc = Document::new(value);
        if !value.is_object() {
            return Err(DecodeError::Malformed("update is not an object".into()));
        }
        let update_id = doc
            .u64("update_id")
            .ok_or(DecodeError::MissingField("update_id"))?;

        let Some(kind) = UpdateKind::ALL
            .into_iter()
            .find(|k| doc.contains(k.api_name()))
        else {
            return Ok(Self {
                update_id,
                payload: UpdatePayload::Undefined,
            });
        };

        let key = kind.api_name();
        let payload = match kind {
            UpdateKind::Message => UpdatePayload::Message(required(&doc, key)?),
            UpdateKind::EditedMessage => UpdatePayload::EditedMessage(required(&doc, key)?),
            UpdateKind::ChannelPost => UpdatePayload::ChannelPost(required(&doc, key)?),
            UpdateKind::EditedChannelPost => {
                UpdatePayload::EditedChannelPost(required(&doc, key)?)
            }
            UpdateKind::InlineQuery => UpdatePayload::InlineQuery(required(&doc, key)?),
            UpdateKind::ChosenInlineResult => {
                UpdatePayload::ChosenInlineResult(required(&doc, key)?)
            }
            UpdateKind::CallbackQuery => UpdatePayload::CallbackQuery(required(&doc, key)?),
        };

        Ok(Self { update_id, payload })
    }

    /// Parses and classifies a single update from raw bytes.
    pub fn from_slice(raw: &[u8]) -> DecodeResult<Self> {
        let value: Value = serde_json::from_slice(raw)?;
        Self::from_document(&value)
    }

    /// The kind of the populated payload, or `None` for `Undefined`.
    pub fn kind(&self) -> Option<UpdateKind> {
        Some(match &self.payload {
            UpdatePayload::Message(_) => UpdateKind::Message,
            UpdatePayload::EditedMessage(_) => UpdateKind::EditedMessage,
            UpdatePayload::ChannelPost(_) => UpdateKind::ChannelPost,
            UpdatePayload::EditedChannelPost(_) => UpdateKind::EditedChannelPost,
            UpdatePayload::InlineQuery(_) => UpdateKind::InlineQuery,
            UpdatePayload::ChosenInlineResult(_) => UpdateKind::ChosenInlineResult,
            UpdatePayload::CallbackQuery(_) => UpdateKind::CallbackQuery,
            UpdatePayload::Undefined => return None,
        })
    }

    /// The message carried by this update.
    ///
    /// For the four message variants this is the payload itself. For a
    /// callback query it is a borrow of `callback_query.message`, never a
    /// separate copy.
    pub fn message(&self) -> Option<&Message> {
        match &self.payload {
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m) => Some(m),
            UpdatePayload::CallbackQuery(q) => q.message.as_ref(),
            _ => None,
        }
    }

    pub fn inline_query(&self) -> Option<&InlineQuery> {
        match &self.payload {
            UpdatePayload::InlineQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn chosen_inline_result(&self) -> Option<&ChosenInlineResult> {
        match &self.payload {
            UpdatePayload::ChosenInlineResult(r) => Some(r),
            _ => None,
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match &self.payload {
            UpdatePayload::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    /// The text that prefix routing rules match against: the query of an
    /// inline query or chosen result, the data of a callback query, or the
    /// text of a message.
    pub fn route_text(&self) -> Option<&str> {
        match &self.payload {
            UpdatePayload::InlineQuery(q) => Some(&q.query),
            UpdatePayload::ChosenInlineResult(r) => Some(&r.query),
            UpdatePayload::CallbackQuery(q) => q.data.as_deref(),
            UpdatePayload::Message(m)
            | UpdatePayload::EditedMessage(m)
            | UpdatePayload::ChannelPost(m)
            | UpdatePayload::EditedChannelPost(m) => m.text.as_deref(),
            UpdatePayload::Undefined => None,
        }
    }
}

fn required<T: serde::de::DeserializeOwned>(doc: &Document<'_>, key: &'static str) -> DecodeResult<T> {
    doc.decode(key)?.ok_or(DecodeError::MissingField(key))
}
