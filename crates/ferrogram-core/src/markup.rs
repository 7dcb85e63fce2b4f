//! Reply markup: keyboards attached to outgoing messages.
//!
//! Four mutually exclusive shapes exist on the wire:
//!
//! ```text
//! {"force_reply":true[,"selective":true]}
//! {"remove_keyboard":true[,"selective":true]}
//! {"keyboard":[[...]],"resize_keyboard":true?,"one_time_keyboard":true?,"selective":true?}
//! {"inline_keyboard":[[...]]}
//! ```
//!
//! Field order inside each object is fixed by the wire structs below.

use serde::{Serialize, Serializer};

fn is_false(b: &bool) -> bool {
    !*b
}

/// A button of an inline keyboard.
///
/// A button carries its label plus at most one action; the constructors
/// guarantee that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch_inline_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch_inline_query_current_chat: Option<String>,
}

impl InlineKeyboardButton {
    fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: None,
            switch_inline_query: None,
            switch_inline_query_current_chat: None,
        }
    }

    /// A button that sends `data` back as a callback query.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            callback_data: Some(data.into()),
            ..Self::label(text)
        }
    }

    /// A button that opens `url`.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::label(text)
        }
    }

    /// A button that starts an inline query in a chat picked by the user.
    pub fn switch_inline_query(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            switch_inline_query: Some(query.into()),
            ..Self::label(text)
        }
    }

    /// A button that starts an inline query in the current chat.
    pub fn switch_inline_query_current_chat(
        text: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            switch_inline_query_current_chat: Some(query.into()),
            ..Self::label(text)
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback_data.as_deref()
    }
}

/// A button of a normal (reply) keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "is_false")]
    pub request_contact: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub request_location: bool,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
            request_location: false,
        }
    }

    /// Asks the client to share the user's phone number when pressed.
    pub fn request_contact(mut self) -> Self {
        self.request_contact = true;
        self
    }

    /// Asks the client to share the user's location when pressed.
    pub fn request_location(mut self) -> Self {
        self.request_location = true;
        self
    }
}

/// Rows of inline buttons.
pub type InlineKeyboard = Vec<Vec<InlineKeyboardButton>>;

/// A normal keyboard that replaces the user's input keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboard {
    #[serde(rename = "keyboard")]
    pub rows: Vec<Vec<KeyboardButton>>,
    #[serde(skip_serializing_if = "is_false")]
    pub resize_keyboard: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub one_time_keyboard: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub selective: bool,
}

/// Structured UI attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    ForceReply { selective: bool },
    RemoveKeyboard { selective: bool },
    Keyboard(ReplyKeyboard),
    InlineKeyboard(InlineKeyboard),
}

#[derive(Serialize)]
struct ForceReplyWire {
    force_reply: bool,
    #[serde(skip_serializing_if = "is_false")]
    selective: bool,
}

#[derive(Serialize)]
struct RemoveKeyboardWire {
    remove_keyboard: bool,
    #[serde(skip_serializing_if = "is_false")]
    selective: bool,
}

#[derive(Serialize)]
struct InlineKeyboardWire<'a> {
    inline_keyboard: &'a InlineKeyboard,
}

impl Serialize for ReplyMarkup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::ForceReply { selective } => ForceReplyWire {
                force_reply: true,
                selective: *selective,
            }
            .serialize(serializer),
            Self::RemoveKeyboard { selective } => RemoveKeyboardWire {
                remove_keyboard: true,
                selective: *selective,
            }
            .serialize(serializer),
            Self::Keyboard(keyboard) => keyboard.serialize(serializer),
            Self::InlineKeyboard(rows) => InlineKeyboardWire {
                inline_keyboard: rows,
            }
            .serialize(serializer),
        }
    }
}

impl ReplyMarkup {
    pub fn inline(rows: InlineKeyboard) -> Self {
        Self::InlineKeyboard(rows)
    }

    /// Returns true for keyboards without rows, which are not worth sending.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Keyboard(k) => k.rows.is_empty(),
            Self::InlineKeyboard(rows) => rows.is_empty(),
            _ => false,
        }
    }

    /// Returns true for the inline variant, the only one that can be
    /// attached when editing an existing message.
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::InlineKeyboard(_))
    }

    /// Serializes to the JSON fragment sent as `reply_markup`.
    pub fn to_json(&self) -> String {
        // Serializing plain strings and bools into a String cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<InlineKeyboard> for ReplyMarkup {
    fn from(rows: InlineKeyboard) -> Self {
        Self::InlineKeyboard(rows)
    }
}

impl From<ReplyKeyboard> for ReplyMarkup {
    fn from(keyboard: ReplyKeyboard) -> Self {
        Self::Keyboard(keyboard)
    }
}

// =============================================================================
// Paged inline menus
// =============================================================================

/// Builds a paged inline menu from a list of entries.
///
/// Each entry becomes a callback button whose data is `data_pattern` with
/// `{}` replaced by the entry. Paging adds `<` / `>` buttons whose data is
/// `{base}..{page}`, where `base` is the pattern up to its last `.` (or the
/// pattern with an empty entry when it has no `.`).
///
/// ```rust
/// use ferrogram_core::InlineMenu;
///
/// let rows = InlineMenu::new(["a", "b", "c"], "pick.{}")
///     .columns(2)
///     .page_size(2)
///     .build(0);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1][0].text(), ">");
/// assert_eq!(rows[1][0].callback_data(), Some("pick..1"));
/// ```
#[derive(Debug, Clone)]
pub struct InlineMenu {
    entries: Vec<String>,
    data_pattern: String,
    columns: usize,
    page_size: usize,
    back: Option<String>,
}

impl InlineMenu {
    pub fn new<I, S>(entries: I, data_pattern: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            data_pattern: data_pattern.into(),
            columns: 1,
            page_size: 0,
            back: None,
        }
    }

    /// Buttons per row; `0` puts every entry of the page on one row.
    pub fn columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    /// Entries per page; `0` disables paging.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Adds a `Back` button sending `data`.
    pub fn back(mut self, data: impl Into<String>) -> Self {
        self.back = Some(data.into());
        self
    }

    fn base(&self) -> String {
        match self.data_pattern.rfind('.') {
            Some(dot) => self.data_pattern[..dot].to_string(),
            None => self.data_pattern.replace("{}", ""),
        }
    }

    /// Lays out page `page` (zero based). A page past the last entry has
    /// no entry buttons.
    pub fn build(&self, page: usize) -> InlineKeyboard {
        let visible: &[String] = if self.page_size == 0 {
            &self.entries
        } else {
            let start = page.saturating_mul(self.page_size).min(self.entries.len());
            let end = start.saturating_add(self.page_size).min(self.entries.len());
            &self.entries[start..end]
        };

        let mut rows: InlineKeyboard = Vec::new();
        let mut column = 0;
        for entry in visible {
            if rows.is_empty() || (self.columns > 0 && column == self.columns) {
                rows.push(Vec::new());
                column = 0;
            }
            if let Some(row) = rows.last_mut() {
                row.push(InlineKeyboardButton::callback(
                    entry.clone(),
                    self.data_pattern.replace("{}", entry),
                ));
            }
            column += 1;
        }

        let has_previous = page > 0;
        let has_next = self.page_size > 0
            && page.saturating_add(1).saturating_mul(self.page_size) < self.entries.len();
        let base = self.base();

        let mut navigation = Vec::new();
        if let Some(back) = &self.back {
            navigation.push(InlineKeyboardButton::callback("Back", back.clone()));
        }
        if has_previous {
            navigation.push(InlineKeyboardButton::callback(
                "<",
                format!("{base}..{}", page - 1),
            ));
        }
        if has_next {
            navigation.push(InlineKeyboardButton::callback(
                ">",
                format!("{base}..{}", page + 1),
            ));
        }
        if !navigation.is_empty() {
            rows.push(navigation);
        }

        rows
    }
}
