//! Prefix routing rules.
//!
//! A [`MessageRoute`] runs its handler when the update kind passes the
//! route's kind filter and the update's route text starts with the route's
//! prefix. The route text is the message text, the inline or chosen query,
//! or the callback data, depending on the update kind.
//!
//! ```rust,ignore
//! use ferrogram_framework::{MessageRoute, RouteFlow};
//! use ferrogram_core::{UpdateKind, UpdateKinds};
//!
//! let route = MessageRoute::new("/start", |update: Arc<Update>| async move {
//!     println!("start from {:?}", update.message().and_then(|m| m.from.as_ref()));
//!     RouteFlow::Stop
//! })
//! .kinds(UpdateKinds::from(UpdateKind::Message));
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ferrogram_core::{Update, UpdateKinds};

/// A boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Whether later routes still see the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteFlow {
    #[default]
    Continue,
    Stop,
}

/// Handles updates matched by a route.
///
/// Implemented for async closures `Fn(Arc<Update>) -> impl Future<Output = RouteFlow>`.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, update: Arc<Update>) -> BoxFuture<'static, RouteFlow>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = RouteFlow> + Send + 'static,
{
    fn handle(&self, update: Arc<Update>) -> BoxFuture<'static, RouteFlow> {
        Box::pin(self(update))
    }
}

/// A routing rule: prefix, kind filter and handler.
#[derive(Clone)]
pub struct MessageRoute {
    prefix: String,
    kinds: UpdateKinds,
    handler: Arc<dyn RouteHandler>,
}

impl MessageRoute {
    /// A route for every update kind.
    pub fn new(prefix: impl Into<String>, handler: impl RouteHandler + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            kinds: UpdateKinds::empty(),
            handler: Arc::new(handler),
        }
    }

    /// Restricts the route to `kinds`; the empty set admits every kind.
    pub fn kinds(mut self, kinds: UpdateKinds) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if the route applies to `update`.
    ///
    /// Updates without a route text match only the empty prefix; undefined
    /// updates never match.
    pub fn matches(&self, update: &Update) -> bool {
        let Some(kind) = update.kind() else {
            return false;
        };
        self.kinds.admits(kind)
            && update
                .route_text()
                .unwrap_or_default()
                .starts_with(self.prefix.as_str())
    }

    pub(crate) fn handler(&self) -> Arc<dyn RouteHandler> {
        self.handler.clone()
    }
}

impl fmt::Debug for MessageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRoute")
            .field("prefix", &self.prefix)
            .field("kinds", &self.kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrogram_core::{UpdateKind, UpdatePayload};
    use serde_json::json;

    fn message(id: u64, key: &str, text: Option<&str>) -> Update {
        let mut msg = json!({"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}});
        if let Some(text) = text {
            msg["text"] = json!(text);
        }
        Update::from_document(&json!({"update_id": id, key: msg})).unwrap()
    }

    fn noop(_: Arc<Update>) -> impl Future<Output = RouteFlow> + Send + 'static {
        async { RouteFlow::Continue }
    }

    #[test]
    fn test_kind_filter_uses_membership() {
        let route = MessageRoute::new("/", noop).kinds(
            UpdateKinds::from(UpdateKind::EditedMessage).with(UpdateKind::ChannelPost),
        );
        assert!(route.matches(&message(1, "edited_message", Some("/x"))));
        assert!(route.matches(&message(2, "channel_post", Some("/x"))));
        assert!(!route.matches(&message(3, "message", Some("/x"))));
    }

    #[test]
    fn test_prefix_and_missing_text() {
        let start = MessageRoute::new("/start", noop);
        assert!(start.matches(&message(1, "message", Some("/start now"))));
        assert!(!start.matches(&message(2, "message", Some("/stop"))));
        assert!(!start.matches(&message(3, "message", None)));

        let any = MessageRoute::new("", noop);
        assert!(any.matches(&message(4, "message", None)));
    }

    #[test]
    fn test_undefined_never_matches() {
        let update = Update {
            update_id: 1,
            payload: UpdatePayload::Undefined,
        };
        assert!(!MessageRoute::new("", noop).matches(&update));
    }
}
