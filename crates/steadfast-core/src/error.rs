//! Error types for the Steadfast call engine.
//!
//! Errors are split by concern: configuration problems surface at load or
//! policy-construction time, `CallError` describes a single failed remote
//! invocation, and `ExecuteError` describes the terminal outcome of a whole
//! retry chain.

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for Steadfast operations.
#[derive(Error, Debug)]
pub enum SteadfastError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A resilient call did not produce a value
    #[error("Call failed: {0}")]
    Execute(#[from] ExecuteError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// A single failed invocation of a wrapped operation.
///
/// The failure classifier only looks at `name` and `message`, so anything that
/// can be described by those two strings can flow through the retry executor.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{name}: {message}")]
pub struct CallError {
    /// Short error kind, e.g. `NetworkError` or `TimeoutError`
    pub name: String,
    /// Human-readable detail
    pub message: String,
    /// HTTP status code when the failure came from a response
    pub status: Option<u16>,
}

impl CallError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Connection-level failure (DNS, refused, reset).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new("NetworkError", message)
    }

    /// The request did not complete in time.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("TimeoutError", message)
    }

    /// Non-success HTTP response. The status code is embedded in the message
    /// so that signature matching on `"503"` and friends works.
    pub fn http(status: u16, detail: impl AsRef<str>) -> Self {
        let detail = detail.as_ref();
        let message = if detail.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {detail}")
        };
        Self {
            name: "HttpError".to_string(),
            message,
            status: Some(status),
        }
    }

    /// The response arrived but could not be understood.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new("ParseError", message)
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CallError::timeout(format!("Request timed out: {err}"))
        } else if err.is_connect() || err.is_request() {
            CallError::network(format!("Failed to fetch: {err}"))
        } else if let Some(status) = err.status() {
            CallError::http(status.as_u16(), err.to_string())
        } else if err.is_decode() || err.is_body() {
            CallError::parse(format!("Failed to read response: {err}"))
        } else {
            CallError::new("RequestError", err.to_string())
        }
    }
}

/// Terminal outcome of a retry chain that did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// The circuit breaker is open; the operation was not invoked
    #[error("Service temporarily unavailable: circuit breaker is open")]
    CircuitOpen,

    /// This failure pushed the breaker over its threshold
    #[error("Circuit breaker opened after failure: {0}")]
    CircuitTripped(CallError),

    /// The operation failed with an error that is not worth retrying
    #[error("{0}")]
    Failed(CallError),

    /// The retry budget ran out; carries the last real error
    #[error("Maximum retry attempts reached ({attempts} retries): {error}")]
    Exhausted { attempts: u32, error: CallError },

    /// `cancel()` halted the chain before the next scheduled attempt
    #[error("Retry cancelled")]
    Cancelled { last_error: Option<CallError> },

    /// A chain is already running on this executor
    #[error("A call is already in progress on this executor")]
    InProgress,

    /// The connectivity monitor reports that the service is unreachable
    #[error("No connectivity: network is offline or the API is unreachable")]
    Offline,
}

impl ExecuteError {
    /// The underlying operation error, if the operation was actually invoked.
    pub fn call_error(&self) -> Option<&CallError> {
        match self {
            ExecuteError::CircuitTripped(e) | ExecuteError::Failed(e) => Some(e),
            ExecuteError::Exhausted { error, .. } => Some(error),
            ExecuteError::Cancelled { last_error } => last_error.as_ref(),
            ExecuteError::CircuitOpen | ExecuteError::InProgress | ExecuteError::Offline => None,
        }
    }

    /// True for both the synthesized rejection and the tripping failure.
    pub fn is_circuit_open(&self) -> bool {
        matches!(
            self,
            ExecuteError::CircuitOpen | ExecuteError::CircuitTripped(_)
        )
    }
}

/// A notifier could not deliver a notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The delivery surface is not present in this process
    #[error("Notifier '{0}' is unavailable")]
    Unavailable(String),

    /// The surface exists but delivery failed
    #[error("Notifier '{name}' failed: {message}")]
    Delivery { name: String, message: String },
}

/// Convenience type alias for Steadfast results.
pub type Result<T> = std::result::Result<T, SteadfastError>;

/// Convenience type alias for a single invocation.
pub type CallResult<T> = std::result::Result<T, CallError>;
