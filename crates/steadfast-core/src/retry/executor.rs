//! Retry executor: runs one logical call through classification, the circuit
//! breaker and exponential backoff.
//!
//! Retries are driven by an explicit loop. Cancellation is a token checked at
//! the top of every iteration and raced against the backoff countdown, so a
//! cancelled chain unwinds without touching the wrapped operation again.

use super::backoff;
use super::breaker::{CircuitBreaker, CircuitObserver};
use super::classifier::is_retryable;
use super::policy::RetryPolicy;
use super::state::RetryState;
use crate::error::{CallError, CallResult, ExecuteError};
use crate::sync::lock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Granularity of the visible `next_retry_in` countdown.
const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

/// Boxed future returned by a wrapped operation.
pub type BoxedCall<T> = Pin<Box<dyn Future<Output = CallResult<T>> + Send>>;

type Operation<T> = Arc<dyn Fn() -> BoxedCall<T> + Send + Sync>;
type RetryCallback = Arc<dyn Fn(u32, &CallError) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&CallError) + Send + Sync>;
type SuccessCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
    on_retry: Option<RetryCallback>,
    on_max_retries_reached: Option<ErrorCallback>,
    on_success: Option<SuccessCallback>,
}

/// Executes a zero-argument async operation with retries.
///
/// One executor is bound to one operation. At most one invocation of that
/// operation is in flight at a time; a second `execute()` while a chain is
/// running is rejected with [`ExecuteError::InProgress`].
pub struct RetryExecutor<T> {
    operation: Operation<T>,
    policy: Arc<RetryPolicy>,
    breaker: CircuitBreaker,
    state: Arc<watch::Sender<RetryState>>,
    circuit_observer: CircuitObserver,
    callbacks: Callbacks,
    chain: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
    rng: Mutex<StdRng>,
}

impl<T: Send + 'static> RetryExecutor<T> {
    /// Bind `operation` to `policy` with a private circuit breaker.
    pub fn new<F, Fut>(policy: impl Into<Arc<RetryPolicy>>, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult<T>> + Send + 'static,
    {
        let policy = policy.into();
        let breaker = CircuitBreaker::from_policy(&policy);
        let (state, _) = watch::channel(RetryState::default());
        let state = Arc::new(state);
        let circuit_observer = circuit_observer(&state);
        breaker.observe(&circuit_observer);
        Self {
            operation: Arc::new(move || Box::pin(operation()) as BoxedCall<T>),
            policy,
            breaker,
            state,
            circuit_observer,
            callbacks: Callbacks::default(),
            chain: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Guard this executor with a shared breaker instead of a private one.
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        breaker.observe(&self.circuit_observer);
        (self.circuit_observer)(breaker.is_open());
        self.breaker = breaker;
        self
    }

    /// Seed the jitter RNG for reproducible delays.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Called with the upcoming attempt number before each backoff wait.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, &CallError) + Send + Sync + 'static,
    {
        self.callbacks.on_retry = Some(Arc::new(f));
        self
    }

    /// Called with the last error when the retry budget runs out.
    pub fn on_max_retries_reached<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallError) + Send + Sync + 'static,
    {
        self.callbacks.on_max_retries_reached = Some(Arc::new(f));
        self
    }

    /// Called when an attempt succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_success = Some(Arc::new(f));
        self
    }

    /// Run the operation, retrying transient failures.
    ///
    /// Continues from the current `retry_count`; use [`retry`](Self::retry)
    /// to start over from attempt zero.
    pub async fn execute(&self) -> Result<T, ExecuteError> {
        let _chain = self.chain.try_lock().map_err(|_| ExecuteError::InProgress)?;
        let token = self.chain_token();
        self.run(token).await
    }

    /// Cancel any pending chain, clear state and execute from attempt zero.
    ///
    /// Waits for an in-flight invocation of the previous chain to settle
    /// before starting, so attempts never overlap.
    pub async fn retry(&self) -> Result<T, ExecuteError> {
        self.cancel();
        let _chain = self.chain.lock().await;
        self.state.send_replace(self.fresh_state());
        let token = self.chain_token();
        self.run(token).await
    }

    /// Clear state without executing. Pending retries are cancelled; the
    /// circuit breaker is left alone.
    pub fn reset(&self) {
        lock(&self.cancel).cancel();
        self.state.send_replace(self.fresh_state());
    }

    /// Stop the pending scheduled retry. The running `execute()` resolves
    /// with [`ExecuteError::Cancelled`] instead of attempting again.
    pub fn cancel(&self) {
        lock(&self.cancel).cancel();
        self.state.send_if_modified(|s| {
            if s.is_retrying {
                s.is_retrying = false;
                s.next_retry_in = 0;
                s.cancelled = true;
                true
            } else {
                false
            }
        });
    }

    /// Current state. Breaker transitions are folded in as they happen, so
    /// this always matches what `subscribe()` receivers see.
    pub fn snapshot(&self) -> RetryState {
        self.state.borrow().clone()
    }

    /// Watch state changes published by the running chain and by the
    /// breaker opening or closing.
    pub fn subscribe(&self) -> watch::Receiver<RetryState> {
        self.state.subscribe()
    }

    pub fn status_message(&self) -> String {
        self.snapshot().status_message()
    }

    pub fn is_retrying(&self) -> bool {
        self.state.borrow().is_retrying
    }

    pub fn retry_count(&self) -> u32 {
        self.state.borrow().retry_count
    }

    pub fn next_retry_in(&self) -> Duration {
        self.state.borrow().next_retry_in()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Initial state, keeping the breaker's current open flag.
    fn fresh_state(&self) -> RetryState {
        let open = self.breaker.is_open();
        RetryState {
            is_circuit_open: open,
            can_retry: !open,
            ..RetryState::default()
        }
    }

    /// Token for a new chain. A token cancelled by an earlier `cancel()` or
    /// `reset()` is replaced; a live one is reused.
    fn chain_token(&self) -> CancellationToken {
        let mut current = lock(&self.cancel);
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.clone()
    }

    async fn run(&self, token: CancellationToken) -> Result<T, ExecuteError> {
        loop {
            if token.is_cancelled() {
                return Err(self.cancelled());
            }

            if let Err(err) = self.breaker.ensure_closed() {
                tracing::debug!("Circuit open, rejecting call without invoking operation");
                self.state.send_modify(|s| {
                    s.is_retrying = false;
                    s.next_retry_in = 0;
                    s.is_circuit_open = true;
                    s.can_retry = false;
                });
                return Err(err);
            }

            self.state.send_modify(|s| {
                s.is_retrying = true;
                s.can_retry = true;
                s.last_error = None;
                s.next_retry_in = 0;
                s.is_circuit_open = false;
                s.max_retries_reached = false;
                s.cancelled = false;
            });

            let retry_count = self.state.borrow().retry_count;
            tracing::debug!(retry_count, "Invoking operation");

            let error = match (self.operation)().await {
                Ok(value) => {
                    self.breaker.record_success();
                    self.state.send_replace(RetryState::default());
                    if let Some(cb) = &self.callbacks.on_success {
                        cb();
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            self.state
                .send_modify(|s| s.last_error = Some(error.clone()));

            if self.breaker.record_failure() {
                self.state.send_modify(|s| {
                    s.is_retrying = false;
                    s.can_retry = false;
                    s.is_circuit_open = true;
                });
                return Err(ExecuteError::CircuitTripped(error));
            }

            let retryable = is_retryable(&error, &self.policy);
            if !retryable || retry_count >= self.policy.max_retries() {
                self.state.send_modify(|s| {
                    s.is_retrying = false;
                    s.can_retry = false;
                    s.max_retries_reached = retryable;
                });
                if !retryable {
                    tracing::debug!(error = %error, "Non-retryable failure");
                    return Err(ExecuteError::Failed(error));
                }
                tracing::warn!(
                    retries = retry_count,
                    error = %error,
                    "Maximum retry attempts reached"
                );
                if let Some(cb) = &self.callbacks.on_max_retries_reached {
                    cb(&error);
                }
                return Err(ExecuteError::Exhausted {
                    attempts: retry_count,
                    error,
                });
            }

            let attempt = retry_count + 1;
            let delay = backoff::delay(attempt, self.policy.backoff(), &mut *lock(&self.rng));
            self.state.send_modify(|s| {
                s.retry_count = attempt;
                s.next_retry_in = delay.as_millis() as u64;
            });
            tracing::debug!(
                "Retry {attempt}/{} after {delay:?}: {error}",
                self.policy.max_retries()
            );
            if let Some(cb) = &self.callbacks.on_retry {
                cb(attempt, &error);
            }

            if !self.countdown(delay, &token).await {
                return Err(self.cancelled());
            }
        }
    }

    /// Tick `next_retry_in` down to zero. Returns `false` if cancelled first.
    async fn countdown(&self, delay: Duration, token: &CancellationToken) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.state
                .send_modify(|s| s.next_retry_in = remaining.as_millis() as u64);
            if remaining.is_zero() {
                return true;
            }
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep(remaining.min(COUNTDOWN_TICK)) => {}
            }
        }
    }

    fn cancelled(&self) -> ExecuteError {
        tracing::debug!("Retry chain cancelled");
        let mut last_error = None;
        self.state.send_modify(|s| {
            s.is_retrying = false;
            s.next_retry_in = 0;
            s.cancelled = true;
            last_error = s.last_error.clone();
        });
        ExecuteError::Cancelled { last_error }
    }
}

/// Mirror breaker transitions into an executor's published state. A closed
/// circuit makes another attempt possible again.
fn circuit_observer(state: &Arc<watch::Sender<RetryState>>) -> CircuitObserver {
    let state = Arc::downgrade(state);
    Arc::new(move |open| {
        let Some(state) = state.upgrade() else { return };
        state.send_if_modified(|s| {
            if s.is_circuit_open == open {
                return false;
            }
            s.is_circuit_open = open;
            s.can_retry = !open;
            true
        });
    })
}

impl<T> Drop for RetryExecutor<T> {
    fn drop(&mut self) {
        lock(&self.cancel).cancel();
    }
}
