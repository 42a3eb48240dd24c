use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Generation timeout, token budget and temperature are usable
/// - Recovery interval and batch limit are positive when the loop is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    config
        .generation
        .validate()
        .map_err(ConfigError::ValidationError)?;

    if config.notifications.delivery_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "notifications.delivery_timeout_ms cannot be 0".to_string(),
        ));
    }

    if config.recovery.enabled {
        if config.recovery.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "recovery.interval_secs cannot be 0".to_string(),
            ));
        }
        if config.recovery.batch_limit == 0 {
            return Err(ConfigError::ValidationError(
                "recovery.batch_limit cannot be 0".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_generation_timeout_fails() {
        let mut config = Config::default();
        config.generation.timeout_ms = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validate_recovery_interval_ignored_when_disabled() {
        let mut config = Config::default();
        config.recovery.enabled = false;
        config.recovery.interval_secs = 0;
        assert!(validate_config(&config).is_ok());

        config.recovery.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
