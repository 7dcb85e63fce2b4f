//! Configuration loading and validation.
//!
//! Sources are layered with figment: defaults, config files, `FERROGRAM_*`
//! environment variables, then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DeliveryConfig, FerrogramConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PollingConfig, SpanEventConfig, WebhookConfig,
};
pub use validation::validate_config;
