//! Data model: updates and the records they carry.

pub mod records;
pub mod update;

pub use records::{
    CallbackQuery, Chat, ChosenInlineResult, File, InlineQuery, Location, Message, MessageEntity,
    MessageHeader, PhotoSize, User, WebhookInfo,
};
pub use update::{Update, UpdatePayload};
