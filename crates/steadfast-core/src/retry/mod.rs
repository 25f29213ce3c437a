//! Retry executor, circuit breaker, backoff and failure classification.

pub mod backoff;
pub mod breaker;
pub mod classifier;
pub mod executor;
pub mod policy;
pub mod state;

pub use breaker::{CircuitBreaker, CircuitBreakerBuilder, CircuitBreakerState};
pub use classifier::{is_retryable, DEFAULT_RETRYABLE_SIGNATURES};
pub use executor::{BoxedCall, RetryExecutor};
pub use policy::{BackoffPolicy, RetryPolicy, RetryPolicyBuilder};
pub use state::RetryState;
