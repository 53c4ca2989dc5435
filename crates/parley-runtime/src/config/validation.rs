//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CacheConfig, LogOutput, LoggingConfig, MAX_TTL_MINUTES, ParleyConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_cache_config(&config.cache)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates cache lifetimes.
fn validate_cache_config(cache: &CacheConfig) -> ConfigResult<()> {
    validate_ttl("cache.conversation_ttl_minutes", cache.conversation_ttl_minutes)?;
    validate_ttl("cache.user_ttl_minutes", cache.user_ttl_minutes)
}

fn validate_ttl(key: &str, minutes: u64) -> ConfigResult<()> {
    if minutes == 0 {
        return Err(ConfigError::validation(format!(
            "{key} must be greater than 0"
        )));
    }

    if minutes > MAX_TTL_MINUTES {
        return Err(ConfigError::validation(format!(
            "{key} must be at most {MAX_TTL_MINUTES}, got {minutes}"
        )));
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter module name: '{module}'"
        )));
    }

    Ok(())
}
