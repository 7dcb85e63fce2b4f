//! # Ferrogram Transport
//!
//! Network plumbing for the ferrogram bot client.
//!
//! ## Features
//!
//! - `http-client` (default): [`HttpApiCaller`](api::HttpApiCaller), the
//!   reqwest-backed outbound caller
//! - `http-server` (default): TLS termination and the webhook accept loop
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐        ┌─────────────────────────────┐
//! │ outbound                  │        │ inbound (webhooks)          │
//! │                           │        │                             │
//! │ ApiCaller ─▶ HttpApiCaller│        │ HttpServer                  │
//! │   GET  /bot{token}/{m}?.. │        │  └─ TlsAcceptor (allow-list)│
//! │   POST multipart uploads  │        │      └─ RequestParser       │
//! └───────────────────────────┘        │          └─ HttpRouter      │
//!                                      └─────────────────────────────┘
//! ```
//!
//! The request parser, response and router in [`http`] have no optional
//! dependencies and are always available.

pub mod api;
pub mod http;

#[cfg(feature = "http-server")]
pub mod server;
#[cfg(feature = "http-server")]
pub mod tls;

pub use api::{ApiCaller, DEFAULT_API_URL, parse_envelope};

#[cfg(feature = "http-client")]
pub use api::HttpApiCaller;

#[cfg(feature = "http-server")]
pub use server::{DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpServer, ServerOptions};
#[cfg(feature = "http-server")]
pub use tls::{AllowEntry, AllowList, MaybeTlsStream, TlsAcceptor, TlsIdentity};
