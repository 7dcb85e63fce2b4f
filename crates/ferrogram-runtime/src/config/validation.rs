//! Configuration validation utilities.

use ferrogram_core::RetryConfig;
use ferrogram_transport::AllowList;

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, DeliveryConfig, FerrogramConfig, LogOutput, LoggingConfig, PollingConfig,
    WebhookConfig,
};

/// Validates the entire configuration.
pub fn validate_config(config: &FerrogramConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    match &config.delivery {
        DeliveryConfig::Polling(polling) => validate_polling_config(polling)?,
        DeliveryConfig::Webhook(webhook) => validate_webhook_config(webhook)?,
    }
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }
    if bot.token.contains(['/', '?', '#', ' ']) {
        return Err(ConfigError::validation(
            "Bot token cannot contain '/', '?', '#' or spaces",
        ));
    }

    validate_url(&bot.api_url)?;

    if bot.request_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "Request timeout must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if !(1..=100).contains(&polling.limit) {
        return Err(ConfigError::validation(format!(
            "Poll limit must be between 1 and 100, got {}",
            polling.limit
        )));
    }
    validate_retry_config(&polling.retry)
}

fn validate_webhook_config(webhook: &WebhookConfig) -> ConfigResult<()> {
    if webhook.port == 0 {
        return Err(ConfigError::InvalidPort(webhook.port));
    }
    if webhook.cert_path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("delivery.cert_path"));
    }
    if webhook.key_path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("delivery.key_path"));
    }
    if webhook.max_connections == Some(0) {
        return Err(ConfigError::validation(
            "max_connections must be greater than 0",
        ));
    }
    if webhook.inactivity_timeout_ms == 0
        || webhook.request_timeout_ms == 0
        || webhook.handshake_timeout_ms == 0
    {
        return Err(ConfigError::validation(
            "Webhook timeouts must be greater than 0",
        ));
    }
    AllowList::parse(&webhook.allow_list)
        .map_err(|e| ConfigError::InvalidAllowEntry(e.0))?;
    Ok(())
}

/// Validates retry configuration.
fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {:?}", valid_schemes),
        ));
    }

    Ok(())
}
