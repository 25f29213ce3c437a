//! Connectivity-guarded retry execution.

use crate::connectivity::ConnectivityMonitor;
use crate::error::ExecuteError;
use crate::retry::RetryExecutor;

/// A `RetryExecutor` that refuses to start while the monitor reports the
/// network offline or the API unreachable.
///
/// The guard is checked once per call, before the first attempt. A chain
/// already running is not interrupted by a later connectivity change.
pub struct ResilientCaller<T> {
    executor: RetryExecutor<T>,
    monitor: Option<ConnectivityMonitor>,
}

impl<T: Send + 'static> ResilientCaller<T> {
    pub fn new(executor: RetryExecutor<T>, monitor: ConnectivityMonitor) -> Self {
        Self {
            executor,
            monitor: Some(monitor),
        }
    }

    /// Caller without a connectivity guard.
    pub fn unguarded(executor: RetryExecutor<T>) -> Self {
        Self {
            executor,
            monitor: None,
        }
    }

    /// Guarded [`RetryExecutor::execute`].
    pub async fn call(&self) -> Result<T, ExecuteError> {
        self.ensure_online()?;
        self.executor.execute().await
    }

    /// Guarded [`RetryExecutor::retry`].
    pub async fn retry(&self) -> Result<T, ExecuteError> {
        self.ensure_online()?;
        self.executor.retry().await
    }

    pub fn executor(&self) -> &RetryExecutor<T> {
        &self.executor
    }

    pub fn monitor(&self) -> Option<&ConnectivityMonitor> {
        self.monitor.as_ref()
    }

    fn ensure_online(&self) -> Result<(), ExecuteError> {
        match &self.monitor {
            Some(monitor) if !monitor.is_fully_online() => {
                let state = monitor.state();
                tracing::debug!(
                    online = state.is_online,
                    api_healthy = state.is_api_healthy,
                    "Skipping call: no connectivity"
                );
                Err(ExecuteError::Offline)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{
        DeviceSignal, HealthProbe, MonitorCallbacks, MonitorOptions,
    };
    use crate::error::CallError;
    use crate::retry::{BackoffPolicy, RetryPolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct FixedProbe(bool);

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn check(&self, _: &str, _: CancellationToken) -> bool {
            self.0
        }
    }

    fn monitor(device: &DeviceSignal, healthy: bool) -> ConnectivityMonitor {
        let options = MonitorOptions {
            endpoints: vec!["https://api.example".to_string()],
            ping_interval: Duration::from_secs(30),
            max_probe_retries: 0,
            backoff: BackoffPolicy::new(
                Duration::from_millis(100),
                Duration::from_millis(100),
                2.0,
                false,
            )
            .unwrap(),
        };
        ConnectivityMonitor::new(
            options,
            Arc::new(FixedProbe(healthy)),
            device,
            MonitorCallbacks::default(),
        )
    }

    fn executor(calls: Arc<AtomicU32>) -> RetryExecutor<&'static str> {
        RetryExecutor::new(RetryPolicy::default(), move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CallError>("done")
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_short_circuits_without_invoking() {
        let device = DeviceSignal::new(false);
        let calls = Arc::new(AtomicU32::new(0));
        let caller = ResilientCaller::new(executor(calls.clone()), monitor(&device, true));

        assert_eq!(caller.call().await, Err(ExecuteError::Offline));
        assert_eq!(caller.retry().await, Err(ExecuteError::Offline));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_api_short_circuits() {
        let device = DeviceSignal::new(true);
        let monitor = monitor(&device, false);
        assert!(!monitor.check_api_health().await);

        let calls = Arc::new(AtomicU32::new(0));
        let caller = ResilientCaller::new(executor(calls.clone()), monitor);
        assert_eq!(caller.call().await, Err(ExecuteError::Offline));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fully_online_executes() {
        let device = DeviceSignal::new(true);
        let monitor = monitor(&device, true);
        assert!(monitor.check_api_health().await);

        let calls = Arc::new(AtomicU32::new(0));
        let caller = ResilientCaller::new(executor(calls.clone()), monitor);
        assert_eq!(caller.call().await, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unguarded_always_executes() {
        let calls = Arc::new(AtomicU32::new(0));
        let caller = ResilientCaller::unguarded(executor(calls.clone()));
        assert_eq!(caller.call().await, Ok("done"));
        assert!(caller.monitor().is_none());
    }
}
