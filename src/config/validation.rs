use crate::config::types::{Config, NotifyConfig, ScheduleConfig, SearchConfig, TransportConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_schedule_config(&config.schedule)?;
    validate_transport_config(&config.transport)?;
    validate_notify_config(&config.notify)?;

    if config.storage.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|_| ConfigError::InvalidUrl(config.base_url.clone()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must be http(s), got scheme '{}'",
            url.scheme()
        )));
    }

    if !config.query_template.contains("{query}") {
        return Err(ConfigError::Validation(
            "query_template must contain a {query} placeholder".to_string(),
        ));
    }

    if !config.query_template.contains("{page}") {
        return Err(ConfigError::Validation(
            "query_template must contain a {page} placeholder".to_string(),
        ));
    }

    if config.keywords.is_empty() {
        return Err(ConfigError::Validation(
            "at least one keyword is required".to_string(),
        ));
    }

    if config.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "keywords cannot be blank".to_string(),
        ));
    }

    if config.max_pages_per_cycle < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_cycle must be >= 1, got {}",
            config.max_pages_per_cycle
        )));
    }

    Ok(())
}

/// Validates schedule configuration
fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.base_interval_mins < 1 {
        return Err(ConfigError::Validation(
            "base_interval_mins must be >= 1".to_string(),
        ));
    }

    if config.max_interval_mins < config.base_interval_mins {
        return Err(ConfigError::Validation(format!(
            "max_interval_mins ({}) must be >= base_interval_mins ({})",
            config.max_interval_mins, config.base_interval_mins
        )));
    }

    if config.interval_multiplier < 2 {
        return Err(ConfigError::Validation(
            "interval_multiplier must be >= 2".to_string(),
        ));
    }

    if config.empty_page_threshold < 1 {
        return Err(ConfigError::Validation(
            "empty_page_threshold must be >= 1".to_string(),
        ));
    }

    if config.window_start_hour > 23 || config.window_end_hour > 24 {
        return Err(ConfigError::Validation(format!(
            "operating window hours out of range: {}..{}",
            config.window_start_hour, config.window_end_hour
        )));
    }

    if config.window_start_hour >= config.window_end_hour {
        return Err(ConfigError::Validation(format!(
            "window_start_hour ({}) must be before window_end_hour ({})",
            config.window_start_hour, config.window_end_hour
        )));
    }

    if !(-12..=14).contains(&config.utc_offset_hours) {
        return Err(ConfigError::Validation(format!(
            "utc_offset_hours must be between -12 and 14, got {}",
            config.utc_offset_hours
        )));
    }

    if config.max_page_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_page_attempts must be >= 1".to_string(),
        ));
    }

    if config.page_retry_min_secs > config.page_retry_max_secs {
        return Err(ConfigError::Validation(format!(
            "page_retry_min_secs ({}) must be <= page_retry_max_secs ({})",
            config.page_retry_min_secs, config.page_retry_max_secs
        )));
    }

    Ok(())
}

/// Validates transport configuration
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.session_ttl_secs < 60 {
        return Err(ConfigError::Validation(format!(
            "session_ttl_secs must be >= 60, got {}",
            config.session_ttl_secs
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_min_secs > config.backoff_max_secs {
        return Err(ConfigError::Validation(format!(
            "backoff_min_secs ({}) must be <= backoff_max_secs ({})",
            config.backoff_min_secs, config.backoff_max_secs
        )));
    }

    if config.content_selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "content_selector cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates notify configuration
fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if config.bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "bot_token cannot be empty".to_string(),
        ));
    }

    if config.chat_id.is_empty() {
        return Err(ConfigError::Validation(
            "chat_id cannot be empty".to_string(),
        ));
    }

    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(
            "chunk_size must be >= 1".to_string(),
        ));
    }

    if config.max_message_chars < 256 {
        return Err(ConfigError::Validation(format!(
            "max_message_chars must be >= 256, got {}",
            config.max_message_chars
        )));
    }

    Ok(())
}
