//! Runtime error types.

use thiserror::Error;

use ferrogram_core::{ApiError, IdentityError, TransportError};

use crate::config::ConfigError;

/// Errors raised while installing a webhook.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Certificate or key could not be loaded.
    #[error("webhook identity: {0}")]
    Identity(#[from] IdentityError),

    /// The port already serves a different private key.
    #[error("port {port} already serves a different private key")]
    KeyMismatch { port: u16 },

    /// The listener could not be bound.
    #[error("cannot listen for webhooks: {0}")]
    Bind(#[from] TransportError),

    /// The `setWebhook` call failed.
    #[error("setWebhook failed: {0}")]
    Api(#[from] ApiError),

    /// The remote API answered `setWebhook` with `false`.
    #[error("setWebhook was not accepted")]
    Rejected,
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    /// Building the API client failed.
    #[error("cannot create API client: {0}")]
    Client(#[from] TransportError),
}

/// Result type for webhook configuration.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
