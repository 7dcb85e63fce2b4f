//! Update dispatcher.
//!
//! The [`Dispatcher`] sits behind both delivery modes. For every body it
//! receives it:
//!
//! 1. Normalizes the body into updates (see [`normalize`])
//! 2. Tracks the highest `update_id` seen
//! 3. Publishes each update on a broadcast channel
//! 4. Runs the routing rules in registration order, stopping early when a
//!    handler returns [`RouteFlow::Stop`]
//!
//! A handler that panics is logged and treated as [`RouteFlow::Continue`].
//!
//! ```rust,ignore
//! let dispatcher = Arc::new(Dispatcher::new());
//! let mut events = dispatcher.subscribe();
//! dispatcher.add_route(MessageRoute::new("/ping", |_| async { RouteFlow::Stop }));
//!
//! tokio::spawn(async move {
//!     while let Ok(update) = events.recv().await {
//!         println!("update {}", update.update_id);
//!     }
//! });
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{Instrument, debug, debug_span, error, trace};

use ferrogram_core::Update;

use crate::normalizer::{NormalizeError, normalize};
use crate::route::{MessageRoute, RouteFlow, RouteHandler};

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What one call to [`Dispatcher::process`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Updates published and routed.
    pub dispatched: usize,
    /// Elements that failed to decode.
    pub skipped: usize,
    /// Highest `update_id` of this body.
    pub max_update_id: Option<u64>,
}

/// Distributes updates to subscribers and routing rules.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` between the
/// poller, the webhook endpoint and the application.
pub struct Dispatcher {
    routes: RwLock<Vec<MessageRoute>>,
    events: broadcast::Sender<Arc<Update>>,
    last_update_id: Mutex<Option<u64>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a dispatcher whose broadcast channel buffers `capacity`
    /// updates per lagging subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            routes: RwLock::new(Vec::new()),
            events,
            last_update_id: Mutex::new(None),
        }
    }

    /// Appends a routing rule. Rules run in the order they are added.
    pub fn add_route(&self, route: MessageRoute) {
        debug!(prefix = %route.prefix(), "Registered message route");
        self.routes.write().push(route);
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Subscribes to every update, routed or not.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Update>> {
        self.events.subscribe()
    }

    /// Highest `update_id` processed so far.
    pub fn last_update_id(&self) -> Option<u64> {
        *self.last_update_id.lock()
    }

    fn advance(&self, update_id: u64) {
        let mut last = self.last_update_id.lock();
        *last = (*last).max(Some(update_id));
    }

    /// Decodes `raw` and dispatches its updates in delivery order.
    ///
    /// `single` marks a webhook body holding one update; otherwise `raw` is
    /// a `getUpdates` envelope that must report `ok: true`.
    ///
    /// # Errors
    /// Returns [`NormalizeError`] when the whole body is unusable. Single
    /// malformed elements are skipped and counted instead.
    pub async fn process(&self, raw: &[u8], single: bool) -> Result<ProcessOutcome, NormalizeError> {
        let normalized = normalize(raw, single)?;

        let outcome = ProcessOutcome {
            dispatched: normalized.updates.len(),
            skipped: normalized.skipped,
            max_update_id: normalized.max_update_id(),
        };
        // Undecodable updates still move the cursor past them.
        for &update_id in &normalized.skipped_ids {
            self.advance(update_id);
        }
        for update in normalized.updates {
            self.dispatch(update).await;
        }

        trace!(
            dispatched = outcome.dispatched,
            skipped = outcome.skipped,
            max_update_id = ?outcome.max_update_id,
            "Processed body",
        );
        Ok(outcome)
    }

    /// Publishes one update and runs the matching routes.
    ///
    /// Returns true if any route handled the update.
    pub async fn dispatch(&self, update: Update) -> bool {
        let update_id = update.update_id;
        self.advance(update_id);

        let update = Arc::new(update);
        // No subscribers is not an error.
        let _ = self.events.send(update.clone());

        let handlers: Vec<Arc<dyn RouteHandler>> = self
            .routes
            .read()
            .iter()
            .filter(|route| route.matches(&update))
            .map(MessageRoute::handler)
            .collect();

        let span = debug_span!("dispatch", update_id, kind = ?update.kind());
        async move {
            let mut any_matched = false;
            for handler in handlers {
                any_matched = true;
                // Each handler runs in its own task so a panic stays contained.
                let flow = match tokio::spawn(handler.handle(update.clone())).await {
                    Ok(flow) => flow,
                    Err(e) => {
                        error!(error = %e, "Route handler failed");
                        RouteFlow::Continue
                    }
                };
                if flow == RouteFlow::Stop {
                    debug!("Route stopped dispatch");
                    break;
                }
            }
            any_matched
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_count", &self.routes.read().len())
            .field("last_update_id", &self.last_update_id())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
