//! Live retry state published by a `RetryExecutor`.

use crate::error::CallError;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of one executor's progress.
///
/// Invariants maintained by the executor: `retry_count <= max_retries`, and
/// `is_circuit_open` implies `!can_retry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryState {
    /// A chain is running: an attempt is in flight or a retry is scheduled
    pub is_retrying: bool,
    /// Attempts made beyond the first
    pub retry_count: u32,
    /// Error from the most recent failed attempt
    pub last_error: Option<CallError>,
    /// Milliseconds until the scheduled retry fires
    pub next_retry_in: u64,
    /// Whether another attempt is still possible
    pub can_retry: bool,
    /// Whether the guarding circuit breaker is open
    pub is_circuit_open: bool,
    /// The retry budget ran out on the last chain
    pub max_retries_reached: bool,
    /// `cancel()` halted the last chain
    pub cancelled: bool,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            is_retrying: false,
            retry_count: 0,
            last_error: None,
            next_retry_in: 0,
            can_retry: true,
            is_circuit_open: false,
            max_retries_reached: false,
            cancelled: false,
        }
    }
}

impl RetryState {
    pub fn next_retry_in(&self) -> Duration {
        Duration::from_millis(self.next_retry_in)
    }

    /// Human-readable status for UI layers. Derived, never stored.
    pub fn status_message(&self) -> String {
        if self.is_circuit_open {
            return "Service temporarily unavailable. Please try again later.".to_string();
        }
        if self.is_retrying {
            if self.next_retry_in > 0 {
                let seconds = self.next_retry_in.div_ceil(1000);
                return format!("Retrying in {seconds} seconds...");
            }
            if self.retry_count > 0 {
                return "Retrying...".to_string();
            }
            return "Connecting...".to_string();
        }
        if self.max_retries_reached {
            return "Maximum retry attempts reached.".to_string();
        }
        if self.cancelled {
            return "Retry cancelled.".to_string();
        }
        match &self.last_error {
            Some(error) if !self.can_retry => format!("Request failed: {}", error.message),
            _ => "Ready".to_string(),
        }
    }
}
