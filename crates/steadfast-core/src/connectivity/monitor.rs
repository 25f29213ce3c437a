//! Connectivity monitor: device online/offline tracking plus periodic API
//! health probing.
//!
//! The monitor owns three kinds of resources: a listener task on the device
//! signal, a self-rescheduling ping task, and the cancellation token of the
//! probe in flight. All of them are released on `shutdown()` or when the last
//! handle is dropped.

use super::device::{DeviceSignal, DeviceStatus};
use super::probe::HealthProbe;
use super::quality::{ConnectionQuality, ConnectivityState};
use crate::config::ConnectivityConfig;
use crate::error::ConfigError;
use crate::retry::backoff;
use crate::retry::BackoffPolicy;
use crate::sync::lock;
use futures_util::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Probe schedule and endpoint set.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Endpoints probed in parallel; one success marks the API healthy
    pub endpoints: Vec<String>,
    /// Pause between the end of one probe and the start of the next
    pub ping_interval: Duration,
    /// Extra probe rounds after every endpoint failed
    pub max_probe_retries: u32,
    /// Backoff between probe rounds
    pub backoff: BackoffPolicy,
}

impl MonitorOptions {
    pub fn from_config(config: &ConnectivityConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoints: config.endpoints.clone(),
            ping_interval: Duration::from_millis(config.ping_interval_ms),
            max_probe_retries: config.max_probe_retries,
            backoff: BackoffPolicy::from_connectivity_config(config)?,
        })
    }
}

/// Optional transition callbacks, invoked synchronously.
#[derive(Default, Clone)]
pub struct MonitorCallbacks {
    on_online: Option<Callback>,
    on_offline: Option<Callback>,
    on_api_healthy: Option<Callback>,
    on_api_unhealthy: Option<Callback>,
}

impl MonitorCallbacks {
    pub fn on_online<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_online = Some(Arc::new(f));
        self
    }

    pub fn on_offline<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_offline = Some(Arc::new(f));
        self
    }

    pub fn on_api_healthy<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_api_healthy = Some(Arc::new(f));
        self
    }

    pub fn on_api_unhealthy<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_api_unhealthy = Some(Arc::new(f));
        self
    }
}

fn fire(callback: &Option<Callback>) {
    if let Some(cb) = callback {
        cb();
    }
}

struct Inner {
    options: MonitorOptions,
    probe: Arc<dyn HealthProbe>,
    device: watch::Receiver<DeviceStatus>,
    state: watch::Sender<ConnectivityState>,
    callbacks: MonitorCallbacks,
    /// Parent of every probe and listener token. Replaced on restart.
    lifecycle: Mutex<CancellationToken>,
    probe_token: Mutex<Option<CancellationToken>>,
    ping_task: Mutex<Option<JoinHandle<()>>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    reported_health: Mutex<Option<bool>>,
    rng: Mutex<StdRng>,
}

impl Inner {
    fn hint(&self) -> Option<String> {
        self.device.borrow().connection_hint.clone()
    }

    /// Start a probe, cancelling any probe still pending.
    fn begin_probe(&self) -> CancellationToken {
        let token = lock(&self.lifecycle).child_token();
        if let Some(previous) = lock(&self.probe_token).replace(token.clone()) {
            previous.cancel();
        }
        self.state.send_if_modified(|s| {
            let changed = s.retry_count != 0;
            s.retry_count = 0;
            changed
        });
        token
    }

    fn abort_probe(&self) {
        if let Some(token) = lock(&self.probe_token).take() {
            token.cancel();
        }
    }

    async fn check_api_health(&self) -> bool {
        let online = self.state.borrow().is_online;
        if !online {
            self.set_health(false);
            return false;
        }

        let token = self.begin_probe();
        loop {
            let healthy = self.probe_round(&token).await;
            if token.is_cancelled() {
                return false;
            }
            if healthy {
                self.set_health(true);
                return true;
            }

            let retries = self.state.borrow().retry_count;
            if retries >= self.options.max_probe_retries {
                tracing::warn!(
                    endpoints = self.options.endpoints.len(),
                    "No health endpoint reachable after {retries} probe retries"
                );
                self.state.send_modify(|s| s.retry_count = 0);
                self.set_health(false);
                return false;
            }

            let attempt = retries + 1;
            let delay = backoff::delay(attempt, &self.options.backoff, &mut *lock(&self.rng));
            self.state.send_modify(|s| s.retry_count = attempt);
            tracing::debug!(
                "Health probe retry {attempt}/{} in {delay:?}",
                self.options.max_probe_retries
            );
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One parallel round over every endpoint. Resolves as soon as any
    /// endpoint answers; remaining checks are dropped.
    async fn probe_round(&self, token: &CancellationToken) -> bool {
        if self.options.endpoints.is_empty() {
            return true;
        }
        let probe = &self.probe;
        let mut checks: FuturesUnordered<_> = self
            .options
            .endpoints
            .iter()
            .map(|endpoint| {
                let token = token.clone();
                async move { (endpoint, probe.check(endpoint, token).await) }
            })
            .collect();

        while let Some((endpoint, ok)) = checks.next().await {
            if ok {
                tracing::debug!(endpoint = %endpoint, "Health endpoint reachable");
                return true;
            }
        }
        false
    }

    fn set_health(&self, healthy: bool) {
        let hint = self.hint();
        self.state.send_if_modified(|s| {
            let quality = ConnectionQuality::classify(s.is_online, healthy, hint.as_deref());
            let changed = s.is_api_healthy != healthy || s.connection_type != Some(quality);
            s.is_api_healthy = healthy;
            s.connection_type = Some(quality);
            changed
        });

        let previous = lock(&self.reported_health).replace(healthy);
        if previous == Some(healthy) {
            return;
        }
        if healthy {
            tracing::info!("API reachable");
            fire(&self.callbacks.on_api_healthy);
        } else {
            tracing::warn!("API unreachable");
            fire(&self.callbacks.on_api_unhealthy);
        }
    }

    fn apply_device_status(self: &Arc<Self>, status: DeviceStatus) {
        let was_online = self.state.borrow().is_online;
        match (was_online, status.online) {
            (false, true) => self.go_online(),
            (true, false) => self.go_offline(),
            _ => {
                let hint = status.connection_hint;
                self.state.send_if_modified(|s| {
                    let quality =
                        ConnectionQuality::classify(s.is_online, s.is_api_healthy, hint.as_deref());
                    let changed = s.connection_type != Some(quality);
                    s.connection_type = Some(quality);
                    changed
                });
            }
        }
    }

    fn go_online(self: &Arc<Self>) {
        let hint = self.hint();
        self.state.send_modify(|s| {
            s.is_online = true;
            s.last_online_time = Some(SystemTime::now());
            s.connection_type = Some(ConnectionQuality::classify(
                true,
                s.is_api_healthy,
                hint.as_deref(),
            ));
        });
        tracing::info!("Network online");
        fire(&self.callbacks.on_online);
        self.restart_ping();
    }

    fn go_offline(&self) {
        self.abort_probe();
        self.stop_ping();
        self.state.send_modify(|s| {
            s.is_online = false;
            s.retry_count = 0;
        });
        self.set_health(false);
        tracing::info!("Network offline");
        fire(&self.callbacks.on_offline);
    }

    /// Probe now, then again `ping_interval` after each probe completes.
    fn restart_ping(self: &Arc<Self>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let interval = self.options.ping_interval;
        let handle = tokio::spawn(async move {
            loop {
                let Some(inner) = weak.upgrade() else { break };
                let online = inner.state.borrow().is_online;
                if !online {
                    break;
                }
                inner.check_api_health().await;
                drop(inner);
                tokio::time::sleep(interval).await;
            }
        });
        if let Some(previous) = lock(&self.ping_task).replace(handle) {
            previous.abort();
        }
    }

    fn stop_ping(&self) {
        if let Some(handle) = lock(&self.ping_task).take() {
            handle.abort();
        }
    }

    fn spawn_listener(self: &Arc<Self>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let mut device = self.device.clone();
        let shutdown = lock(&self.lifecycle).clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = device.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let status = device.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else { break };
                inner.apply_device_status(status);
            }
        });
        if let Some(previous) = lock(&self.listener_task).replace(handle) {
            previous.abort();
        }
    }

    /// Swap in a live lifecycle token after a previous `teardown()`.
    fn revive(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.is_cancelled() {
            *lifecycle = CancellationToken::new();
        }
    }

    fn teardown(&self) {
        lock(&self.lifecycle).cancel();
        self.abort_probe();
        self.stop_ping();
        if let Some(handle) = lock(&self.listener_task).take() {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Process-wide connectivity monitor. Clones share one state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    /// Create a monitor reading `device`. Nothing runs until [`start`](Self::start).
    pub fn new(
        options: MonitorOptions,
        probe: Arc<dyn HealthProbe>,
        device: &DeviceSignal,
        callbacks: MonitorCallbacks,
    ) -> Self {
        let current = device.current();
        let (state, _) = watch::channel(ConnectivityState::initial(
            current.online,
            current.connection_hint.as_deref(),
        ));
        Self {
            inner: Arc::new(Inner {
                options,
                probe,
                device: device.subscribe(),
                state,
                callbacks,
                lifecycle: Mutex::new(CancellationToken::new()),
                probe_token: Mutex::new(None),
                ping_task: Mutex::new(None),
                listener_task: Mutex::new(None),
                reported_health: Mutex::new(None),
                rng: Mutex::new(StdRng::from_entropy()),
            }),
        }
    }

    /// Attach the device listener and, if online, begin periodic probing.
    /// Can be called again after [`shutdown`](Self::shutdown). Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        self.inner.revive();
        tracing::debug!(
            endpoints = self.inner.options.endpoints.len(),
            interval_ms = self.inner.options.ping_interval.as_millis() as u64,
            "Starting connectivity monitor"
        );
        self.inner.spawn_listener();
        let status = self.inner.device.borrow().clone();
        let was_online = self.inner.state.borrow().is_online;
        if status.online && was_online {
            self.inner.restart_ping();
        } else {
            self.inner.apply_device_status(status);
        }
    }

    /// Detach listeners, clear timers and abort the in-flight probe.
    pub fn shutdown(&self) {
        tracing::debug!("Stopping connectivity monitor");
        self.inner.teardown();
    }

    /// Probe every endpoint now. Cancels a probe that is still pending.
    /// Never fails; an unreachable API simply yields `false`.
    pub async fn check_api_health(&self) -> bool {
        self.inner.check_api_health().await
    }

    /// Force a fresh probe with the probe retry counter reset.
    pub async fn retry(&self) -> bool {
        tracing::debug!("Forcing connectivity re-check");
        self.inner.check_api_health().await
    }

    /// Resync the device flag from the signal, then re-probe.
    pub async fn force_refresh(&self) -> bool {
        let status = self.inner.device.borrow().clone();
        let online = status.online;
        self.inner.apply_device_status(status);
        if online {
            self.inner.check_api_health().await
        } else {
            false
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.inner.state.subscribe()
    }

    pub fn is_fully_online(&self) -> bool {
        self.inner.state.borrow().is_fully_online()
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.inner.state.borrow().connection_quality()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.inner.options.endpoints
    }
}
