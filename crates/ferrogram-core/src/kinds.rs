//! Update kinds and the set type used to filter them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The seven kinds of update the remote API can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
}

impl UpdateKind {
    /// All kinds, in wire order.
    pub const ALL: [UpdateKind; 7] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::CallbackQuery,
    ];

    /// The key under which this kind's payload appears in an update document.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.api_name() == s)
            .ok_or_else(|| format!("unknown update kind: {s}"))
    }
}

/// A set of [`UpdateKind`]s.
///
/// The empty set means "no filter" wherever a filter is accepted.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<UpdateKind>", into = "Vec<UpdateKind>")]
pub struct UpdateKinds(u8);

impl UpdateKinds {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every kind.
    pub fn all() -> Self {
        UpdateKind::ALL.into_iter().collect()
    }

    /// Returns true if `kind` is a member of the set.
    pub fn has_flag(self, kind: UpdateKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn insert(&mut self, kind: UpdateKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: UpdateKind) {
        self.0 &= !kind.bit();
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, kind: UpdateKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the set is empty (no filter) or contains `kind`.
    pub fn admits(self, kind: UpdateKind) -> bool {
        self.is_empty() || self.has_flag(kind)
    }

    /// Iterates the members in wire order.
    pub fn iter(self) -> impl Iterator<Item = UpdateKind> {
        UpdateKind::ALL.into_iter().filter(move |k| self.has_flag(*k))
    }

    /// The wire names of the members, in wire order.
    pub fn api_names(self) -> Vec<&'static str> {
        self.iter().map(UpdateKind::api_name).collect()
    }

    /// Encodes the set as the `allowed_updates` parameter.
    ///
    /// Returns `None` for the empty set so that the parameter is omitted.
    pub fn to_allowed_updates(self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_string(&self.api_names()).ok()
    }
}

impl From<UpdateKind> for UpdateKinds {
    fn from(kind: UpdateKind) -> Self {
        Self(kind.bit())
    }
}

impl FromIterator<UpdateKind> for UpdateKinds {
    fn from_iter<I: IntoIterator<Item = UpdateKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

impl From<Vec<UpdateKind>> for UpdateKinds {
    fn from(kinds: Vec<UpdateKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<UpdateKinds> for Vec<UpdateKind> {
    fn from(kinds: UpdateKinds) -> Self {
        kinds.iter().collect()
    }
}

impl fmt::Debug for UpdateKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
