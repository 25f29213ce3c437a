//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.initial_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.initial_delay_ms must be > 0".into(),
            ));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.max_delay_ms must be >= retry.initial_delay_ms".into(),
            ));
        }
        if retry.backoff_factor <= 1.0 || !retry.backoff_factor.is_finite() {
            return Err(ConfigError::ValidationError(
                "retry.backoff_factor must be a finite number > 1.0".into(),
            ));
        }
        if retry.circuit_breaker_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "retry.circuit_breaker_threshold must be > 0".into(),
            ));
        }
        if retry.circuit_breaker_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.circuit_breaker_timeout_ms must be > 0".into(),
            ));
        }

        let conn = &self.connectivity;
        if conn.ping_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connectivity.ping_interval_ms must be > 0".into(),
            ));
        }
        if conn.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connectivity.probe_timeout_ms must be > 0".into(),
            ));
        }
        if conn.probe_initial_delay_ms == 0 || conn.probe_max_delay_ms < conn.probe_initial_delay_ms
        {
            return Err(ConfigError::ValidationError(
                "connectivity.probe_max_delay_ms must be >= probe_initial_delay_ms > 0".into(),
            ));
        }
        if conn.probe_backoff_factor <= 1.0 || !conn.probe_backoff_factor.is_finite() {
            return Err(ConfigError::ValidationError(
                "connectivity.probe_backoff_factor must be a finite number > 1.0".into(),
            ));
        }
        if let Some(bad) = conn
            .endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(ConfigError::ValidationError(format!(
                "connectivity.endpoints entry '{bad}' must be an http(s) URL"
            )));
        }

        if self.http.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "http.timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_growing_backoff() {
        let mut config = Config::default();
        config.retry.backoff_factor = 1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backoff_factor"));

        config.retry.backoff_factor = -2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 5000;
        config.retry.max_delay_ms = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_delay_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.retry.circuit_breaker_threshold = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("circuit_breaker_threshold"));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let mut config = Config::default();
        config.connectivity.endpoints = vec!["ftp://example.com".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn test_validate_rejects_zero_ping_interval() {
        let mut config = Config::default();
        config.connectivity.ping_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping_interval_ms"));
    }
}
