//! Outbound calls to the bot API.

mod caller;
#[cfg(feature = "http-client")]
mod client;

pub use caller::{ApiCaller, DEFAULT_API_URL, parse_envelope};
#[cfg(feature = "http-client")]
pub use client::HttpApiCaller;
