//! Network status and sync recommendations

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical link the device is using, when the platform can tell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Wifi,
    Cellular,
    None,
    Unknown,
}

/// Link quality derived from probe latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    Excellent,
    Good,
    Poor,
    Unknown,
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkQuality::Excellent => "excellent",
            NetworkQuality::Good => "good",
            NetworkQuality::Poor => "poor",
            NetworkQuality::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Last known connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub connected: bool,
    pub link_type: LinkType,
    pub quality: NetworkQuality,
}

impl NetworkStatus {
    /// Status before the first probe
    pub const fn unknown() -> Self {
        Self {
            connected: false,
            link_type: LinkType::Unknown,
            quality: NetworkQuality::Unknown,
        }
    }

    /// Status after a failed probe
    pub const fn offline() -> Self {
        Self {
            connected: false,
            link_type: LinkType::None,
            quality: NetworkQuality::Unknown,
        }
    }

    /// Connected with a quality other than poor
    pub fn is_usable(&self) -> bool {
        self.connected && self.quality != NetworkQuality::Poor
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Reason reported when the device is offline
pub const REASON_NO_NETWORK: &str = "no network connection";
/// Reason reported when the link is too poor to sync
pub const REASON_POOR_NETWORK: &str = "poor network conditions";
/// Reason reported when syncing is recommended
pub const REASON_OPTIMAL: &str = "network conditions are optimal";

/// Whether the current network state favors a sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecommendation {
    pub should_sync: bool,
    pub reason: String,
    pub quality: NetworkQuality,
}

impl SyncRecommendation {
    /// Derives a recommendation from a status snapshot
    pub fn from_status(status: &NetworkStatus) -> Self {
        if !status.connected {
            return Self {
                should_sync: false,
                reason: REASON_NO_NETWORK.to_string(),
                quality: status.quality,
            };
        }
        if status.quality == NetworkQuality::Poor {
            return Self {
                should_sync: false,
                reason: REASON_POOR_NETWORK.to_string(),
                quality: status.quality,
            };
        }
        Self {
            should_sync: true,
            reason: REASON_OPTIMAL.to_string(),
            quality: status.quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(connected: bool, quality: NetworkQuality) -> NetworkStatus {
        NetworkStatus {
            connected,
            link_type: LinkType::Wifi,
            quality,
        }
    }

    #[test]
    fn offline_is_never_recommended() {
        let rec = SyncRecommendation::from_status(&status(false, NetworkQuality::Excellent));
        assert!(!rec.should_sync);
        assert_eq!(rec.reason, "no network connection");
    }

    #[test]
    fn poor_quality_is_not_recommended() {
        let rec = SyncRecommendation::from_status(&status(true, NetworkQuality::Poor));
        assert!(!rec.should_sync);
        assert_eq!(rec.reason, "poor network conditions");
    }

    #[test]
    fn good_or_unknown_quality_is_recommended() {
        for quality in [
            NetworkQuality::Excellent,
            NetworkQuality::Good,
            NetworkQuality::Unknown,
        ] {
            let rec = SyncRecommendation::from_status(&status(true, quality));
            assert!(rec.should_sync, "{quality} should allow sync");
            assert_eq!(rec.quality, quality);
        }
    }

    #[test]
    fn usable_requires_connection_and_non_poor() {
        assert!(status(true, NetworkQuality::Good).is_usable());
        assert!(!status(true, NetworkQuality::Poor).is_usable());
        assert!(!status(false, NetworkQuality::Good).is_usable());
        assert!(!NetworkStatus::default().is_usable());
    }
}
