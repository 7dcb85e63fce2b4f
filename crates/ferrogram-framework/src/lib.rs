//! # Ferrogram Framework
//!
//! Turns delivered bodies into typed updates and hands them out.
//!
//! This layer provides:
//! - [`normalize`] for `getUpdates` envelopes and single webhook bodies
//! - [`Dispatcher`], which tracks the update cursor, broadcasts every update
//!   and runs the routing rules
//! - [`MessageRoute`] prefix rules with an update-kind filter
//!
//! Delivery itself (long polling, webhooks) lives in the runtime crate; both
//! modes feed the same [`Dispatcher::process`].

pub mod dispatcher;
pub mod normalizer;
pub mod route;

pub use dispatcher::{DEFAULT_EVENT_CAPACITY, Dispatcher, ProcessOutcome};
pub use normalizer::{NormalizeError, Normalized, normalize};
pub use route::{BoxFuture, MessageRoute, RouteFlow, RouteHandler};
