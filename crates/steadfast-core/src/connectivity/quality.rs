//! Connection-quality tiers and the composite connectivity state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Coarse connection tier derived from the device hint and API health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

impl ConnectionQuality {
    /// Classify from device/API status and an optional connection-type hint
    /// such as `"4g"`, `"wifi"` or `"slow-2g"`.
    ///
    /// Offline always wins over the hint. An online device whose API probes
    /// fail is `Poor`. Unknown or missing hints default to `Good`.
    pub fn classify(is_online: bool, is_api_healthy: bool, hint: Option<&str>) -> Self {
        if !is_online {
            return ConnectionQuality::Offline;
        }
        if !is_api_healthy {
            return ConnectionQuality::Poor;
        }
        match hint.map(|h| h.trim().to_ascii_lowercase()).as_deref() {
            Some("4g" | "5g" | "wifi" | "ethernet") => ConnectionQuality::Excellent,
            Some("3g") => ConnectionQuality::Good,
            Some("2g" | "slow-2g") => ConnectionQuality::Poor,
            _ => ConnectionQuality::Good,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Excellent => "excellent",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Offline => "offline",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide connectivity state, written only by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    /// Device-level network availability
    pub is_online: bool,
    /// At least one health endpoint answered the last completed probe
    pub is_api_healthy: bool,
    /// When the device last transitioned to online
    pub last_online_time: Option<SystemTime>,
    /// Derived connection tier
    pub connection_type: Option<ConnectionQuality>,
    /// Probe rounds retried in the current health check
    pub retry_count: u32,
}

impl ConnectivityState {
    pub(crate) fn initial(is_online: bool, hint: Option<&str>) -> Self {
        Self {
            is_online,
            is_api_healthy: false,
            last_online_time: is_online.then(SystemTime::now),
            connection_type: Some(ConnectionQuality::classify(is_online, false, hint)),
            retry_count: 0,
        }
    }

    /// Online and the API answered.
    pub fn is_fully_online(&self) -> bool {
        self.is_online && self.is_api_healthy
    }

    /// Online but the API did not answer.
    pub fn has_connectivity_issues(&self) -> bool {
        self.is_online && !self.is_api_healthy
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        self.connection_type.unwrap_or(ConnectionQuality::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_ignores_hint() {
        assert_eq!(
            ConnectionQuality::classify(false, true, Some("wifi")),
            ConnectionQuality::Offline
        );
    }

    #[test]
    fn test_unhealthy_api_is_poor() {
        assert_eq!(
            ConnectionQuality::classify(true, false, Some("4g")),
            ConnectionQuality::Poor
        );
    }

    #[test]
    fn test_hint_tiers() {
        let q = |hint| ConnectionQuality::classify(true, true, Some(hint));
        assert_eq!(q("4g"), ConnectionQuality::Excellent);
        assert_eq!(q("WiFi"), ConnectionQuality::Excellent);
        assert_eq!(q("3g"), ConnectionQuality::Good);
        assert_eq!(q("2g"), ConnectionQuality::Poor);
        assert_eq!(q("slow-2g"), ConnectionQuality::Poor);
        assert_eq!(q("carrier-pigeon"), ConnectionQuality::Good);
        assert_eq!(
            ConnectionQuality::classify(true, true, None),
            ConnectionQuality::Good
        );
    }

    #[test]
    fn test_derived_flags() {
        let mut state = ConnectivityState::initial(true, None);
        assert!(!state.is_fully_online());
        assert!(state.has_connectivity_issues());

        state.is_api_healthy = true;
        assert!(state.is_fully_online());
        assert!(!state.has_connectivity_issues());

        let offline = ConnectivityState::initial(false, None);
        assert!(!offline.has_connectivity_issues());
        assert!(offline.last_online_time.is_none());
        assert_eq!(offline.connection_quality(), ConnectionQuality::Offline);
    }

    #[test]
    fn test_quality_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionQuality::Excellent).unwrap();
        assert_eq!(json, "\"excellent\"");
    }
}
