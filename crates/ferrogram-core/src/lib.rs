//! # Ferrogram Core
//!
//! Shared types of the ferrogram bot client.
//!
//! This crate has no networking of its own. It defines what travels through
//! the other crates:
//!
//! - **Errors**: [`TransportError`], [`ApiError`], [`DecodeError`],
//!   [`IdentityError`]
//! - **Documents**: dotted-path access into parsed JSON ([`Document`])
//! - **Data model**: [`Update`] with its [`UpdatePayload`] variants and the
//!   records they carry
//! - **Kinds**: [`UpdateKind`] and the filter set [`UpdateKinds`]
//! - **Requests**: ordered [`Params`], [`InputFile`], [`SendFlags`],
//!   [`ChatAction`]
//! - **Markup**: [`ReplyMarkup`] and the paged [`InlineMenu`] builder
//! - **Retry**: [`RetryConfig`] backoff settings
//!
//! ## Data flow
//!
//! ```text
//! raw bytes ──▶ Document ──▶ Update { update_id, payload }
//!                               │
//!                               ├── kind()       ─▶ UpdateKind
//!                               ├── message()    ─▶ &Message (borrowed)
//!                               └── route_text() ─▶ &str
//! ```

pub mod document;
pub mod error;
pub mod kinds;
pub mod markup;
pub mod model;
pub mod request;
pub mod retry;

pub use document::Document;
pub use error::{
    ApiError, ApiResult, DecodeError, DecodeResult, IdentityError, IdentityResult,
    TransportError, TransportResult,
};
pub use kinds::{UpdateKind, UpdateKinds};
pub use markup::{
    InlineKeyboard, InlineKeyboardButton, InlineMenu, KeyboardButton, ReplyKeyboard, ReplyMarkup,
};
pub use model::{
    CallbackQuery, Chat, ChosenInlineResult, File, InlineQuery, Location, Message, MessageEntity,
    MessageHeader, PhotoSize, Update, UpdatePayload, User, WebhookInfo,
};
pub use request::{ChatAction, ChatId, InputFile, MessageRef, Params, SendFlag, SendFlags};
pub use retry::{Backoff, RetryConfig};
