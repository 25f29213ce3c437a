//! Sub-configuration structs with defaults.

use crate::retry::classifier::DEFAULT_RETRYABLE_SIGNATURES;
use serde::{Deserialize, Serialize};

/// Retry executor and circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for any single backoff delay in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt (must be > 1)
    pub backoff_factor: f64,

    /// Randomize delays by up to ±25%
    pub jitter: bool,

    /// Substrings of an error name or message that mark it retryable.
    /// Matching is case-sensitive.
    pub retryable_signatures: Vec<String>,

    /// Consecutive failures that open the circuit breaker
    pub circuit_breaker_threshold: u32,

    /// How long the circuit stays open in milliseconds
    pub circuit_breaker_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: true,
            retryable_signatures: DEFAULT_RETRYABLE_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_ms: 60_000,
        }
    }
}

/// Connectivity monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Health endpoints probed with HEAD requests. One success is enough.
    pub endpoints: Vec<String>,

    /// Delay between completed probes in milliseconds
    pub ping_interval_ms: u64,

    /// Per-endpoint HEAD timeout in milliseconds
    pub probe_timeout_ms: u64,

    /// Extra probe rounds after every endpoint failed
    pub max_probe_retries: u32,

    /// Backoff before the first probe retry in milliseconds
    pub probe_initial_delay_ms: u64,

    /// Upper bound for probe backoff in milliseconds
    pub probe_max_delay_ms: u64,

    /// Multiplier applied per probe retry
    pub probe_backoff_factor: f64,

    /// Randomize probe backoff
    pub probe_jitter: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                "https://huggingface.co/api/models?limit=1".to_string(),
                "https://civitai.com/api/v1/models?limit=1".to_string(),
            ],
            ping_interval_ms: 30_000,
            probe_timeout_ms: 5000,
            max_probe_retries: 3,
            probe_initial_delay_ms: 1000,
            probe_max_delay_ms: 10_000,
            probe_backoff_factor: 2.0,
            probe_jitter: false,
        }
    }
}

/// HTTP collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Minimum spacing between requests from one client in milliseconds.
    /// 0 disables client-side rate limiting.
    pub min_request_interval_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            min_request_interval_ms: 1000,
            user_agent: format!("steadfast/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
