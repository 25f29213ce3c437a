//! Steadfast Core - resilient calls against flaky HTTP services.
//!
//! Three cooperating pieces:
//!
//! - a [`RetryExecutor`] that retries transient failures with exponential
//!   backoff and publishes a live [`RetryState`],
//! - a shared [`CircuitBreaker`] that stops calling a service after repeated
//!   failures and closes again after a cool-down,
//! - a [`ConnectivityMonitor`] that tracks device online/offline status and
//!   probes API endpoints for reachability.
//!
//! # Usage
//!
//! ```rust,ignore
//! use steadfast_core::{Config, Steadfast};
//!
//! #[tokio::main]
//! async fn main() -> steadfast_core::Result<()> {
//!     let engine = Steadfast::new(Config::load()?)?;
//!     engine.start();
//!
//!     let client = engine.client().clone();
//!     let caller = engine.caller(move || {
//!         let client = client.clone();
//!         async move { client.get_text("https://example.com/api").await }
//!     });
//!     let body = caller.call().await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```

pub mod caller;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod notify;
pub mod retry;

mod sync;

pub use caller::ResilientCaller;
pub use config::Config;
pub use connectivity::{
    ConnectionQuality, ConnectivityMonitor, ConnectivityState, DeviceSignal, HealthProbe,
    HttpProbe, MonitorCallbacks, MonitorOptions,
};
pub use error::{
    CallError, CallResult, ConfigError, ExecuteError, NotifyError, Result, SteadfastError,
};
pub use http::{ApiClient, RateLimiter};
pub use notify::{MemoryNotifier, Notification, Notifier, NotifierChain, Severity};
pub use retry::{CircuitBreaker, RetryExecutor, RetryPolicy, RetryState};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Process-level wiring: one policy, one shared breaker, one HTTP client and
/// one connectivity monitor, from which executors and callers are minted.
pub struct Steadfast {
    config: Config,
    policy: Arc<RetryPolicy>,
    breaker: CircuitBreaker,
    client: ApiClient,
    device: DeviceSignal,
    monitor: ConnectivityMonitor,
}

impl Steadfast {
    /// Build with an HTTP health probe and a device signal that starts online.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> SteadfastBuilder {
        SteadfastBuilder {
            config,
            probe: None,
            device: None,
            on_circuit_open: None,
            on_circuit_close: None,
            monitor_callbacks: MonitorCallbacks::default(),
        }
    }

    /// Start background connectivity monitoring.
    pub fn start(&self) {
        tracing::debug!("Starting Steadfast v{}", VERSION);
        self.monitor.start();
    }

    /// Stop monitoring and release timers.
    pub fn shutdown(&self) {
        self.monitor.shutdown();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &Arc<RetryPolicy> {
        &self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn device(&self) -> &DeviceSignal {
        &self.device
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    /// Executor for `operation` sharing this engine's policy and breaker.
    pub fn executor<T, F, Fut>(&self, operation: F) -> RetryExecutor<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult<T>> + Send + 'static,
    {
        RetryExecutor::new(Arc::clone(&self.policy), operation).with_breaker(self.breaker.clone())
    }

    /// Executor guarded by this engine's connectivity monitor.
    pub fn caller<T, F, Fut>(&self, operation: F) -> ResilientCaller<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult<T>> + Send + 'static,
    {
        ResilientCaller::new(self.executor(operation), self.monitor.clone())
    }
}

/// Builder for [`Steadfast`] that lets hosts swap the probe and device
/// signal and attach transition callbacks.
pub struct SteadfastBuilder {
    config: Config,
    probe: Option<Arc<dyn HealthProbe>>,
    device: Option<DeviceSignal>,
    on_circuit_open: Option<Callback>,
    on_circuit_close: Option<Callback>,
    monitor_callbacks: MonitorCallbacks,
}

impl SteadfastBuilder {
    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn device(mut self, device: DeviceSignal) -> Self {
        self.device = Some(device);
        self
    }

    pub fn on_circuit_open<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_circuit_open = Some(Arc::new(f));
        self
    }

    pub fn on_circuit_close<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_circuit_close = Some(Arc::new(f));
        self
    }

    pub fn monitor_callbacks(mut self, callbacks: MonitorCallbacks) -> Self {
        self.monitor_callbacks = callbacks;
        self
    }

    pub fn build(self) -> Result<Steadfast> {
        let config = self.config;
        config.validate()?;

        let policy = Arc::new(RetryPolicy::from_config(&config.retry)?);
        let mut breaker = CircuitBreaker::builder(
            policy.circuit_breaker_threshold(),
            policy.circuit_breaker_timeout(),
        );
        if let Some(cb) = self.on_circuit_open {
            breaker = breaker.on_open(move || cb());
        }
        if let Some(cb) = self.on_circuit_close {
            breaker = breaker.on_close(move || cb());
        }
        let breaker = breaker.build();

        let client = ApiClient::from_config(&config.http)?;
        let probe = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new(client.with_timeout(Duration::from_millis(
                config.connectivity.probe_timeout_ms,
            )))),
        };
        let device = self.device.unwrap_or_default();
        let options = MonitorOptions::from_config(&config.connectivity)?;
        let monitor = ConnectivityMonitor::new(options, probe, &device, self.monitor_callbacks);

        tracing::debug!(
            max_retries = policy.max_retries(),
            threshold = policy.circuit_breaker_threshold(),
            endpoints = monitor.endpoints().len(),
            "Steadfast engine built"
        );

        Ok(Steadfast {
            config,
            policy,
            breaker,
            client,
            device,
            monitor,
        })
    }
}
