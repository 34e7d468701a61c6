use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Instant;

/// A SoundDrift server that answered a discovery probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    /// Source address of the announcement
    pub address: IpAddr,

    /// Name the server announced (`deviceName`)
    pub device_name: String,

    /// When this address first answered while the service has been running
    pub first_seen: Instant,

    /// When this announcement was received
    pub last_seen: Instant,
}

impl DiscoveredServer {
    /// Create a server record seen for the first time now
    #[must_use]
    pub fn new(address: IpAddr, device_name: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            address,
            device_name: device_name.into(),
            first_seen: now,
            last_seen: now,
        }
    }
}

/// Device identity carried by the media handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Human-readable name of this client
    #[serde(rename = "deviceName")]
    pub device_name: String,
}

impl DeviceInfo {
    /// Fallback name when the hostname cannot be read
    pub const FALLBACK_NAME: &'static str = "SoundDrift Player";

    /// Identity for this machine, using the OS hostname
    #[must_use]
    pub fn local() -> Self {
        let device_name = hostname::get().map_or_else(
            |_| Self::FALLBACK_NAME.to_string(),
            |h| h.to_string_lossy().into_owned(),
        );
        Self { device_name }
    }

    /// Identity with an explicit name
    #[must_use]
    pub fn named(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}
