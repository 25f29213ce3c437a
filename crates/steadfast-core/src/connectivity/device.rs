//! Device-level network signal.
//!
//! The host owns a `DeviceSignal` and flips it when the platform reports the
//! network going up or down. The connectivity monitor only ever reads it.

use serde::Serialize;
use tokio::sync::watch;

/// Latest device report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub online: bool,
    /// Platform connection-type hint, e.g. "wifi" or "3g"
    pub connection_hint: Option<String>,
}

/// Writable handle for the device online/offline signal.
#[derive(Debug, Clone)]
pub struct DeviceSignal {
    tx: watch::Sender<DeviceStatus>,
}

impl DeviceSignal {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(DeviceStatus {
            online,
            connection_hint: None,
        });
        Self { tx }
    }

    /// Report an online/offline transition. Repeated reports of the same
    /// value are not forwarded to listeners.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|status| {
            let changed = status.online != online;
            status.online = online;
            changed
        });
    }

    pub fn set_connection_hint(&self, hint: Option<String>) {
        self.tx.send_if_modified(|status| {
            let changed = status.connection_hint != hint;
            status.connection_hint = hint;
            changed
        });
    }

    pub fn current(&self) -> DeviceStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.tx.subscribe()
    }
}

impl Default for DeviceSignal {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_reports_do_not_notify() {
        let signal = DeviceSignal::new(true);
        let mut rx = signal.subscribe();
        signal.set_online(true);
        assert!(!rx.has_changed().unwrap());

        signal.set_online(false);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().online);
    }

    #[test]
    fn test_connection_hint() {
        let signal = DeviceSignal::default();
        signal.set_connection_hint(Some("3g".to_string()));
        assert_eq!(signal.current().connection_hint.as_deref(), Some("3g"));
        assert!(signal.current().online);
    }
}
