//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;
use url::Url;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid backend URL '{value}': {message}")]
    InvalidUrl { value: String, message: String },

    #[error("backend.anon_key cannot be empty")]
    EmptyAnonKey,

    #[error("sync.{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{0}")]
    InvalidLocale(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(message) = check_url(&config.backend.url) {
        errors.push(ValidationError::InvalidUrl {
            value: config.backend.url.clone(),
            message,
        });
    }

    if config
        .backend
        .anon_key
        .as_deref()
        .is_some_and(|key| key.trim().is_empty())
    {
        errors.push(ValidationError::EmptyAnonKey);
    }

    if config.sync.poll_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "poll_interval_seconds",
        });
    }

    if config.sync.events_per_second == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "events_per_second",
        });
    }

    if let Some(Err(message)) = config.app.parsed_locale() {
        errors.push(ValidationError::InvalidLocale(message));
    }

    if let Some(base) = &config.app.invite_base_url
        && let Err(message) = check_url(base)
    {
        errors.push(ValidationError::GlobalError(format!(
            "app.invite_base_url '{}': {}",
            base, message
        )));
    }

    errors
}

/// Accept only absolute http(s) URLs with a host
pub fn check_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err("Expected an http:// or https:// URL".into());
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("Missing host".into());
    }

    Ok(())
}
