use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Relay lists are non-empty and look like websocket URLs
/// - Timeouts and the expiry window are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.relays.read.is_empty() {
        return Err(ConfigError::ValidationError(
            "relays.read cannot be empty".to_string(),
        ));
    }
    if config.relays.write.is_empty() {
        return Err(ConfigError::ValidationError(
            "relays.write cannot be empty".to_string(),
        ));
    }

    for relay in config.relays.read.iter().chain(config.relays.write.iter()) {
        if !relay.starts_with("wss://") && !relay.starts_with("ws://") {
            return Err(ConfigError::ValidationError(format!(
                "relay target must be a websocket url: {}",
                relay
            )));
        }
    }

    if config.orchestrator.discovery_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.discovery_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.result_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.result_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.resume_expiry_hours == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.resume_expiry_hours cannot be 0".to_string(),
        ));
    }

    Ok(())
}
