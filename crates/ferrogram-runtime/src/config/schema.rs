//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ferrogram_core::{RetryConfig, UpdateKinds};
use ferrogram_transport::DEFAULT_API_URL;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FerrogramConfig {
    /// Bot identity and API endpoint.
    #[serde(default)]
    pub bot: BotConfig,

    /// How updates are received.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot identity and API endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by the remote API.
    #[serde(default)]
    pub token: String,

    /// Base URL of the bot API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timeout of a single API call in milliseconds, on top of any long-poll
    /// timeout the call carries.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// Keeps the token out of logs.
impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("api_url", &self.api_url)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

// =============================================================================
// Delivery
// =============================================================================

/// Update delivery mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeliveryConfig {
    /// Long polling via `getUpdates`.
    Polling(PollingConfig),

    /// Pushed callbacks on an embedded HTTPS server.
    Webhook(WebhookConfig),
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self::Polling(PollingConfig::default())
    }
}

/// Long polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Long-poll timeout passed to the remote API, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u32,

    /// Maximum number of updates per batch (1..=100).
    #[serde(default = "default_poll_limit")]
    pub limit: u32,

    /// Update kinds to receive; empty receives everything.
    #[serde(default)]
    pub allowed_updates: UpdateKinds,

    /// Backoff after failed polls.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout_secs(),
            limit: default_poll_limit(),
            allowed_updates: UpdateKinds::empty(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_poll_timeout_secs() -> u32 {
    30
}

fn default_poll_limit() -> u32 {
    100
}

/// Webhook server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Local address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port to listen on; also announced to the remote API.
    pub port: u16,

    /// PEM certificate whose common name is the public host name.
    pub cert_path: PathBuf,

    /// PEM private key matching the certificate.
    pub key_path: PathBuf,

    /// Maximum simultaneous connections the remote API may open.
    #[serde(default)]
    pub max_connections: Option<u32>,

    /// Update kinds to receive; empty receives everything.
    #[serde(default)]
    pub allowed_updates: UpdateKinds,

    /// Extra peers (addresses or IPv4 CIDR subnets) allowed besides the
    /// remote API's published ranges.
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// Idle time after which a connection is dropped, in milliseconds.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    /// Time allowed to receive one complete request, in milliseconds.
    #[serde(default = "default_webhook_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Time allowed for a TLS handshake, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_inactivity_timeout_ms() -> u64 {
    30000
}

fn default_webhook_request_timeout_ms() -> u64 {
    120000
}

fn default_handshake_timeout_ms() -> u64 {
    10000
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `ferrogram_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,
}
