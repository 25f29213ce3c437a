//! Connectivity tracking: is the device online, and is the API reachable.

mod device;
mod monitor;
mod probe;
mod quality;

pub use device::{DeviceSignal, DeviceStatus};
pub use monitor::{ConnectivityMonitor, MonitorCallbacks, MonitorOptions};
pub use probe::{HealthProbe, HttpProbe};
pub use quality::{ConnectionQuality, ConnectivityState};
