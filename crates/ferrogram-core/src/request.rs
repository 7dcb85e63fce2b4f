//! Request building blocks: the ordered parameter list, file inputs and
//! the option sets shared by the send helpers.

use std::fmt;
use std::path::PathBuf;

use crate::markup::ReplyMarkup;

// =============================================================================
// Input files
// =============================================================================

/// A file argument of an API call.
///
/// `Bytes` and `Path` are uploaded as multipart parts; `Url` and `FileId`
/// travel as plain parameters and are resolved by the remote side.
#[derive(Clone, PartialEq, Eq)]
pub enum InputFile {
    /// In-memory content uploaded under `name`.
    Bytes { name: String, data: Vec<u8> },
    /// A local file, read at call time and uploaded under its file name.
    Path(PathBuf),
    /// A public URL the remote API downloads itself.
    Url(String),
    /// The identifier of a file already stored remotely.
    FileId(String),
}

impl InputFile {
    pub fn bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Returns true when the file has to be uploaded as a multipart part.
    pub fn needs_upload(&self) -> bool {
        matches!(self, Self::Bytes { .. } | Self::Path(_))
    }

    /// The plain parameter value of a pass-through file.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Url(s) | Self::FileId(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes { name, data } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("len", &data.len())
                .finish(),
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Url(u) => f.debug_tuple("Url").field(u).finish(),
            Self::FileId(id) => f.debug_tuple("FileId").field(id).finish(),
        }
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Ordered name/value parameters of one API call, plus the files that have
/// to be uploaded with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pairs: Vec<(String, String)>,
    uploads: Vec<(String, InputFile)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.pairs.push((name.into(), value.to_string()));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a parameter when `value` is present.
    pub fn push_opt<V: ToString>(&mut self, name: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    /// Appends `name=true` when `flag` is set.
    pub fn push_flag(&mut self, name: impl Into<String>, flag: bool) {
        if flag {
            self.push(name, "true");
        }
    }

    /// Attaches a file: pass-through files become a plain parameter, the
    /// rest are queued for upload under the part name `field`.
    pub fn push_file(&mut self, field: impl Into<String>, file: InputFile) {
        let field = field.into();
        match file.as_reference() {
            Some(reference) => {
                let reference = reference.to_string();
                self.push(field, reference);
            }
            None => self.uploads.push((field, file)),
        }
    }

    /// Attaches reply markup unless it is an empty keyboard.
    pub fn push_markup(&mut self, markup: Option<&ReplyMarkup>) {
        if let Some(markup) = markup.filter(|m| !m.is_empty()) {
            self.push("reply_markup", markup.to_json());
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.uploads.is_empty()
    }

    pub fn has_uploads(&self) -> bool {
        !self.uploads.is_empty()
    }

    pub fn uploads(&self) -> &[(String, InputFile)] {
        &self.uploads
    }

    /// Form-urlencodes the plain parameters in insertion order.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

// =============================================================================
// Send flags
// =============================================================================

/// One option of [`SendFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendFlag {
    Markdown,
    Html,
    DisableWebPagePreview,
    DisableNotification,
}

impl SendFlag {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Formatting and delivery options of the send helpers.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SendFlags(u8);

impl SendFlags {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true if `flag` is set.
    pub fn has_flag(self, flag: SendFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: SendFlag) {
        self.0 |= flag.bit();
    }

    pub fn with(mut self, flag: SendFlag) -> Self {
        self.insert(flag);
        self
    }

    /// `Markdown` wins over `Html` when both are set.
    pub fn parse_mode(self) -> Option<&'static str> {
        if self.has_flag(SendFlag::Markdown) {
            Some("Markdown")
        } else if self.has_flag(SendFlag::Html) {
            Some("HTML")
        } else {
            None
        }
    }

    /// Writes `parse_mode` and `disable_web_page_preview`.
    pub fn apply_formatting(self, params: &mut Params) {
        params.push_opt("parse_mode", self.parse_mode());
        params.push_flag(
            "disable_web_page_preview",
            self.has_flag(SendFlag::DisableWebPagePreview),
        );
    }

    /// Writes `disable_notification`.
    pub fn apply_notification(self, params: &mut Params) {
        params.push_flag(
            "disable_notification",
            self.has_flag(SendFlag::DisableNotification),
        );
    }
}

impl From<SendFlag> for SendFlags {
    fn from(flag: SendFlag) -> Self {
        Self(flag.bit())
    }
}

impl std::ops::BitOr for SendFlag {
    type Output = SendFlags;

    fn bitor(self, rhs: Self) -> SendFlags {
        SendFlags::from(self).with(rhs)
    }
}

impl std::ops::BitOr<SendFlag> for SendFlags {
    type Output = SendFlags;

    fn bitor(self, rhs: SendFlag) -> SendFlags {
        self.with(rhs)
    }
}

impl fmt::Debug for SendFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            SendFlag::Markdown,
            SendFlag::Html,
            SendFlag::DisableWebPagePreview,
            SendFlag::DisableNotification,
        ];
        f.debug_set()
            .entries(flags.into_iter().filter(|flag| self.has_flag(*flag)))
            .finish()
    }
}

// =============================================================================
// Targets
// =============================================================================

/// A chat addressed by numeric id or by `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ChatId {
    fn from(username: &str) -> Self {
        Self::Username(username.to_string())
    }
}

impl From<String> for ChatId {
    fn from(username: String) -> Self {
        Self::Username(username)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// A message to edit: either a chat message or one sent via inline mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRef {
    Chat { chat_id: ChatId, message_id: i64 },
    Inline(String),
}

impl MessageRef {
    pub fn chat(chat_id: impl Into<ChatId>, message_id: i64) -> Self {
        Self::Chat {
            chat_id: chat_id.into(),
            message_id,
        }
    }

    /// Appends `chat_id` + `message_id`, or `inline_message_id`.
    pub fn apply(&self, params: &mut Params) {
        match self {
            Self::Chat {
                chat_id,
                message_id,
            } => {
                params.push("chat_id", chat_id);
                params.push("message_id", message_id);
            }
            Self::Inline(id) => params.push("inline_message_id", id),
        }
    }
}

// =============================================================================
// Chat actions
// =============================================================================

/// Activity indicator shown to chat members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
    RecordVideo,
    UploadVideo,
    RecordAudio,
    UploadAudio,
    UploadDocument,
    FindLocation,
    RecordVideoNote,
    UploadVideoNote,
}

impl ChatAction {
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::UploadPhoto => "upload_photo",
            Self::RecordVideo => "record_video",
            Self::UploadVideo => "upload_video",
            Self::RecordAudio => "record_audio",
            Self::UploadAudio => "upload_audio",
            Self::UploadDocument => "upload_document",
            Self::FindLocation => "find_location",
            Self::RecordVideoNote => "record_video_note",
            Self::UploadVideoNote => "upload_video_note",
        }
    }
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}
