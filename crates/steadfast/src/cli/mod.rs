//! Command handlers for the `steadfast` binary.

pub mod call;
pub mod config;
pub mod notify;
pub mod probe;
pub mod watch;

use steadfast_core::{
    Config, DeviceSignal, MonitorCallbacks, Notification, NotifierChain, Steadfast,
};

/// Wire an engine whose transitions are reported through `notifier`.
pub fn build_engine(
    config: Config,
    device: DeviceSignal,
    notifier: &NotifierChain,
) -> anyhow::Result<Steadfast> {
    let callbacks = MonitorCallbacks::default()
        .on_online(relay(notifier, || {
            Notification::success("Back online", "Network connection restored")
        }))
        .on_offline(relay(notifier, || {
            Notification::warning("Offline", "Network connection lost")
        }))
        .on_api_healthy(relay(notifier, || {
            Notification::success("API reachable", "Health check succeeded")
        }))
        .on_api_unhealthy(relay(notifier, || {
            Notification::error("API unreachable", "No health endpoint answered")
        }));

    let engine = Steadfast::builder(config)
        .device(device)
        .on_circuit_open(relay(notifier, || {
            Notification::error(
                "Circuit open",
                "Service temporarily unavailable. Please try again later.",
            )
        }))
        .on_circuit_close(relay(notifier, || {
            Notification::info("Circuit closed", "Calls to the service resumed")
        }))
        .monitor_callbacks(callbacks)
        .build()?;
    Ok(engine)
}

fn relay(
    notifier: &NotifierChain,
    make: fn() -> Notification,
) -> impl Fn() + Send + Sync + 'static {
    let notifier = notifier.clone();
    move || {
        notifier.notify(make());
    }
}

/// Log notifications that no visible surface accepted.
pub fn flush_undelivered(notifier: &NotifierChain) {
    for notification in notifier.fallback().drain() {
        tracing::debug!(
            severity = ?notification.severity,
            "{}: {}",
            notification.title,
            notification.body
        );
    }
}
