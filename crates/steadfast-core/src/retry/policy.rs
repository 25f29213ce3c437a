//! Immutable retry and backoff policies.
//!
//! Policies are validated once, when they are built. The backoff calculator
//! and the executor assume a policy is well-formed and never re-check it.

use crate::config::{ConnectivityConfig, RetryConfig};
use crate::error::ConfigError;
use std::time::Duration;

/// Exponential backoff parameters shared by the retry executor and the
/// connectivity monitor's probe loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: bool,
}

impl BackoffPolicy {
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
        jitter: bool,
    ) -> Result<Self, ConfigError> {
        if initial_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "initial delay must be > 0".into(),
            ));
        }
        if max_delay < initial_delay {
            return Err(ConfigError::ValidationError(format!(
                "max delay ({max_delay:?}) must be >= initial delay ({initial_delay:?})"
            )));
        }
        if factor <= 1.0 || !factor.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "backoff factor must be a finite number > 1.0, got {factor}"
            )));
        }
        Ok(Self {
            initial_delay,
            max_delay,
            factor,
            jitter,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Probe backoff from the `[connectivity]` section.
    pub fn from_connectivity_config(config: &ConnectivityConfig) -> Result<Self, ConfigError> {
        Self::new(
            Duration::from_millis(config.probe_initial_delay_ms),
            Duration::from_millis(config.probe_max_delay_ms),
            config.probe_backoff_factor,
            config.probe_jitter,
        )
    }
}

/// Immutable configuration for one retry executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: BackoffPolicy,
    retryable_signatures: Vec<String>,
    circuit_breaker_threshold: u32,
    circuit_breaker_timeout: Duration,
}

impl RetryPolicy {
    /// Start from the default policy and override individual fields.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::from_config(&RetryConfig::default())
    }

    /// Build a policy from the `[retry]` config section.
    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        RetryPolicyBuilder::from_config(config).build()
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn retryable_signatures(&self) -> &[String] {
        &self.retryable_signatures
    }

    /// Consecutive failures that open the circuit.
    pub fn circuit_breaker_threshold(&self) -> u32 {
        self.circuit_breaker_threshold
    }

    /// How long an opened circuit stays open.
    pub fn circuit_breaker_timeout(&self) -> Duration {
        self.circuit_breaker_timeout
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let config = RetryConfig::default();
        Self {
            max_retries: config.max_retries,
            backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(config.initial_delay_ms),
                max_delay: Duration::from_millis(config.max_delay_ms),
                factor: config.backoff_factor,
                jitter: config.jitter,
            },
            retryable_signatures: config.retryable_signatures,
            circuit_breaker_threshold: config.circuit_breaker_threshold,
            circuit_breaker_timeout: Duration::from_millis(config.circuit_breaker_timeout_ms),
        }
    }
}

/// Validating builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: bool,
    retryable_signatures: Vec<String>,
    circuit_breaker_threshold: u32,
    circuit_breaker_timeout: Duration,
}

impl RetryPolicyBuilder {
    fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_factor: config.backoff_factor,
            jitter: config.jitter,
            retryable_signatures: config.retryable_signatures.clone(),
            circuit_breaker_threshold: config.circuit_breaker_threshold,
            circuit_breaker_timeout: Duration::from_millis(config.circuit_breaker_timeout_ms),
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the signature list entirely.
    pub fn retryable_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_signatures = signatures.into_iter().map(Into::into).collect();
        self
    }

    /// Append one signature to the current list.
    pub fn retryable_signature(mut self, signature: impl Into<String>) -> Self {
        self.retryable_signatures.push(signature.into());
        self
    }

    pub fn circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    pub fn circuit_breaker_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        let backoff = BackoffPolicy::new(
            self.initial_delay,
            self.max_delay,
            self.backoff_factor,
            self.jitter,
        )?;
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "circuit breaker threshold must be > 0".into(),
            ));
        }
        if self.circuit_breaker_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "circuit breaker timeout must be > 0".into(),
            ));
        }
        // An empty signature would match every error.
        if self.retryable_signatures.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::ValidationError(
                "retryable signatures must not be empty strings".into(),
            ));
        }
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            backoff,
            retryable_signatures: self.retryable_signatures,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            circuit_breaker_timeout: self.circuit_breaker_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_default_config() {
        let built = RetryPolicy::builder().build().unwrap();
        assert_eq!(built, RetryPolicy::default());
        assert_eq!(built.max_retries(), 3);
        assert_eq!(built.backoff().initial_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_builder_overrides() {
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(100))
            .backoff_factor(3.0)
            .jitter(false)
            .retryable_signatures(["Busy"])
            .retryable_signature("Later")
            .build()
            .unwrap();
        assert_eq!(policy.max_retries(), 2);
        assert_eq!(policy.backoff().factor(), 3.0);
        assert!(!policy.backoff().jitter());
        assert_eq!(policy.retryable_signatures(), ["Busy", "Later"]);
    }

    #[test]
    fn test_rejects_negative_factor() {
        let err = RetryPolicy::builder().backoff_factor(-1.0).build().unwrap_err();
        assert!(err.to_string().contains("backoff factor"));
    }

    #[test]
    fn test_rejects_nan_factor() {
        assert!(RetryPolicy::builder().backoff_factor(f64::NAN).build().is_err());
    }

    #[test]
    fn test_rejects_max_below_initial() {
        let err = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max delay"));
    }

    #[test]
    fn test_rejects_zero_threshold_and_timeout() {
        assert!(RetryPolicy::builder()
            .circuit_breaker_threshold(0)
            .build()
            .is_err());
        assert!(RetryPolicy::builder()
            .circuit_breaker_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_empty_signature() {
        let err = RetryPolicy::builder()
            .retryable_signature("")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("signatures"));
    }

    #[test]
    fn test_zero_retries_is_valid() {
        let policy = RetryPolicy::builder().max_retries(0).build().unwrap();
        assert_eq!(policy.max_retries(), 0);
    }

    #[test]
    fn test_probe_backoff_from_config() {
        let backoff = BackoffPolicy::from_connectivity_config(&ConnectivityConfig::default()).unwrap();
        assert_eq!(backoff.initial_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.max_delay(), Duration::from_millis(10_000));
        assert!(!backoff.jitter());
    }
}
