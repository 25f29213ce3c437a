//! Circuit breaker guarding a flaky service against repeated calls.
//!
//! Two states: Closed (calls pass) and Open (calls are rejected without
//! invoking the operation). The breaker opens once consecutive failures reach
//! the threshold and closes unconditionally when its timeout elapses. There
//! is no half-open trial call.
//!
//! `CircuitBreaker` is a cheap cloneable handle; every clone observes the same
//! state, so one breaker can guard several executors calling the same service.

use super::policy::RetryPolicy;
use crate::error::ExecuteError;
use crate::sync::lock;
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type TransitionCallback = Arc<dyn Fn() + Send + Sync>;

/// Receives `true` when the circuit opens and `false` when it closes.
/// The breaker only holds observers weakly.
pub(crate) type CircuitObserver = Arc<dyn Fn(bool) + Send + Sync>;

/// Observable breaker state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerState {
    /// Consecutive failures since the last success or close
    pub failure_count: u32,
    /// Wall-clock time of the most recent failure
    pub last_failure_time: Option<SystemTime>,
    /// Whether calls are currently rejected
    pub is_open: bool,
}

struct Shared {
    threshold: u32,
    timeout: Duration,
    state: watch::Sender<CircuitBreakerState>,
    close_timer: Mutex<Option<JoinHandle<()>>>,
    on_open: Option<TransitionCallback>,
    on_close: Option<TransitionCallback>,
    observers: Mutex<Vec<Weak<dyn Fn(bool) + Send + Sync>>>,
}

impl Shared {
    fn notify_observers(&self, open: bool) {
        let live: Vec<CircuitObserver> = {
            let mut observers = lock(&self.observers);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer(open);
        }
    }

    fn close(&self) -> bool {
        let closed = self.state.send_if_modified(|s| {
            if s.is_open {
                s.is_open = false;
                s.failure_count = 0;
                true
            } else {
                false
            }
        });
        if closed {
            tracing::info!("Circuit breaker closed");
            self.notify_observers(false);
            if let Some(cb) = &self.on_close {
                cb();
            }
        }
        closed
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.close_timer).take() {
            handle.abort();
        }
    }
}

/// Shared consecutive-failure circuit breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("threshold", &self.shared.threshold)
            .field("timeout", &self.shared.timeout)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl CircuitBreaker {
    /// Breaker without transition callbacks.
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self::builder(threshold, timeout).build()
    }

    /// Breaker configured from a retry policy's threshold and timeout.
    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(
            policy.circuit_breaker_threshold(),
            policy.circuit_breaker_timeout(),
        )
    }

    pub fn builder(threshold: u32, timeout: Duration) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder {
            threshold: threshold.max(1),
            timeout,
            on_open: None,
            on_close: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.borrow().is_open
    }

    pub fn failure_count(&self) -> u32 {
        self.shared.state.borrow().failure_count
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.shared.state.borrow().clone()
    }

    /// Watch breaker transitions.
    pub fn subscribe(&self) -> watch::Receiver<CircuitBreakerState> {
        self.shared.state.subscribe()
    }

    /// Reject immediately when the circuit is open.
    pub fn ensure_closed(&self) -> Result<(), ExecuteError> {
        if self.is_open() {
            Err(ExecuteError::CircuitOpen)
        } else {
            Ok(())
        }
    }

    /// A call succeeded. Clears the consecutive-failure count while closed.
    pub fn record_success(&self) {
        self.shared.state.send_if_modified(|s| {
            if !s.is_open && s.failure_count != 0 {
                s.failure_count = 0;
                true
            } else {
                false
            }
        });
    }

    /// A call failed. Returns `true` when the circuit is open afterwards,
    /// either because this failure tripped it or because it already was.
    ///
    /// Must be called from within a tokio runtime: tripping the breaker
    /// spawns the auto-close timer.
    pub fn record_failure(&self) -> bool {
        let threshold = self.shared.threshold;
        let mut tripped = false;
        let mut already_open = false;
        self.shared.state.send_modify(|s| {
            s.last_failure_time = Some(SystemTime::now());
            if s.is_open {
                already_open = true;
                return;
            }
            s.failure_count = s.failure_count.saturating_add(1);
            if s.failure_count >= threshold {
                s.is_open = true;
                tripped = true;
            }
        });

        if tripped {
            tracing::warn!(
                threshold,
                timeout_ms = self.shared.timeout.as_millis() as u64,
                "Circuit breaker opened after {threshold} consecutive failures"
            );
            self.schedule_close();
            self.shared.notify_observers(true);
            if let Some(cb) = &self.shared.on_open {
                cb();
            }
        }
        tripped || already_open
    }

    /// Force the circuit closed and cancel any pending auto-close timer.
    pub fn reset(&self) {
        if let Some(handle) = lock(&self.shared.close_timer).take() {
            handle.abort();
        }
        self.shared.close();
        self.shared.state.send_if_modified(|s| {
            let changed = s.failure_count != 0 || s.last_failure_time.is_some();
            s.failure_count = 0;
            s.last_failure_time = None;
            changed
        });
    }

    /// Register `observer` for open/close transitions until it is dropped.
    pub(crate) fn observe(&self, observer: &CircuitObserver) {
        lock(&self.shared.observers).push(Arc::downgrade(observer));
    }

    fn schedule_close(&self) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let timeout = self.shared.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = weak.upgrade() {
                lock(&shared.close_timer).take();
                shared.close();
            }
        });
        if let Some(previous) = lock(&self.shared.close_timer).replace(handle) {
            previous.abort();
        }
    }
}

/// Builder that attaches transition callbacks before the breaker is shared.
pub struct CircuitBreakerBuilder {
    threshold: u32,
    timeout: Duration,
    on_open: Option<TransitionCallback>,
    on_close: Option<TransitionCallback>,
}

impl CircuitBreakerBuilder {
    /// Called synchronously when the circuit opens.
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called synchronously when the circuit closes.
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> CircuitBreaker {
        let (state, _) = watch::channel(CircuitBreakerState::default());
        CircuitBreaker {
            shared: Arc::new(Shared {
                threshold: self.threshold,
                timeout: self.timeout,
                state,
                close_timer: Mutex::new(None),
                on_open: self.on_open,
                on_close: self.on_close,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }
}
