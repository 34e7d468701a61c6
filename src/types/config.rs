use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use super::DeviceInfo;
use crate::error::SoundDriftError;
use crate::protocol::ports;

/// Configuration for SoundDrift client behavior
///
/// Every default equals the fixed value of the wire protocol. The port fields
/// exist so embedders and tests can run against ephemeral ports.
#[derive(Debug, Clone)]
pub struct SoundDriftConfig {
    /// Name announced in the media handshake (None = OS hostname)
    pub device_name: Option<String>,

    /// Local address the media and discovery sockets bind to (default: 0.0.0.0)
    pub bind_address: IpAddr,

    /// Local UDP port for the media socket (default: 55555)
    pub media_bind_port: u16,

    /// Server UDP port receiving handshake and disconnect datagrams (default: 55556)
    pub media_server_port: u16,

    /// Server TCP port for the metadata channel (default: 55557)
    pub metadata_port: u16,

    /// Port discovery probes are broadcast to (default: 55558)
    pub discovery_port: u16,

    /// Interval between discovery probes (default: 3 seconds)
    pub probe_interval: Duration,

    /// Period of the media liveness check (default: 1 second)
    pub liveness_tick: Duration,

    /// Silence on the media socket before the session is dropped (default: 5 seconds)
    pub liveness_timeout: Duration,

    /// Pause between tearing down an old session and opening a new one (default: 100ms)
    pub reconnect_settle_delay: Duration,

    /// Timeout for the metadata TCP connect (default: 10 seconds)
    pub connection_timeout: Duration,

    /// Jitter queue capacity in packets (default: 50)
    pub jitter_capacity: usize,

    /// Consecutive silent packets before the jitter queue is flushed (default: 5)
    pub silence_threshold: u32,

    /// Volume used before the caller sets one (default: 1.0)
    pub initial_volume: f32,

    /// Longest metadata frame accepted without a newline (default: 64 KiB)
    pub max_metadata_frame: usize,
}

impl Default for SoundDriftConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            media_bind_port: ports::MEDIA_CLIENT,
            media_server_port: ports::MEDIA_SERVER,
            metadata_port: ports::METADATA,
            discovery_port: ports::DISCOVERY,
            probe_interval: Duration::from_secs(3),
            liveness_tick: Duration::from_secs(1),
            liveness_timeout: Duration::from_secs(5),
            reconnect_settle_delay: Duration::from_millis(100),
            connection_timeout: Duration::from_secs(10),
            jitter_capacity: 50,
            silence_threshold: 5,
            initial_volume: 1.0,
            max_metadata_frame: 64 * 1024,
        }
    }
}

impl SoundDriftConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SoundDriftConfigBuilder {
        SoundDriftConfigBuilder::default()
    }

    /// Check the timer settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `probe_interval` or `liveness_tick` is
    /// zero.
    pub fn validate(&self) -> Result<(), SoundDriftError> {
        for (name, period) in [
            ("probe_interval", self.probe_interval),
            ("liveness_tick", self.liveness_tick),
        ] {
            if period.is_zero() {
                return Err(SoundDriftError::InvalidParameter {
                    name: name.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Identity announced in the media handshake
    #[must_use]
    pub fn device_info(&self) -> DeviceInfo {
        self.device_name
            .as_ref()
            .map_or_else(DeviceInfo::local, DeviceInfo::named)
    }
}

/// Builder for `SoundDriftConfig`
#[derive(Debug, Clone, Default)]
pub struct SoundDriftConfigBuilder {
    config: SoundDriftConfig,
}

impl SoundDriftConfigBuilder {
    /// Set the announced device name
    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = Some(name.into());
        self
    }

    /// Set the local bind address
    #[must_use]
    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.config.bind_address = address;
        self
    }

    /// Set the local media port (0 = ephemeral)
    #[must_use]
    pub fn media_bind_port(mut self, port: u16) -> Self {
        self.config.media_bind_port = port;
        self
    }

    /// Set the server media port
    #[must_use]
    pub fn media_server_port(mut self, port: u16) -> Self {
        self.config.media_server_port = port;
        self
    }

    /// Set the server metadata port
    #[must_use]
    pub fn metadata_port(mut self, port: u16) -> Self {
        self.config.metadata_port = port;
        self
    }

    /// Set the discovery probe port
    #[must_use]
    pub fn discovery_port(mut self, port: u16) -> Self {
        self.config.discovery_port = port;
        self
    }

    /// Set the discovery probe interval
    #[must_use]
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Set the liveness tick and timeout
    #[must_use]
    pub fn liveness(mut self, tick: Duration, timeout: Duration) -> Self {
        self.config.liveness_tick = tick;
        self.config.liveness_timeout = timeout;
        self
    }

    /// Set the settle delay between teardown and reconnect
    #[must_use]
    pub fn reconnect_settle_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_settle_delay = delay;
        self
    }

    /// Set the metadata connect timeout
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the jitter queue capacity
    #[must_use]
    pub fn jitter_capacity(mut self, capacity: usize) -> Self {
        self.config.jitter_capacity = capacity;
        self
    }

    /// Set the silence flush threshold
    #[must_use]
    pub fn silence_threshold(mut self, packets: u32) -> Self {
        self.config.silence_threshold = packets;
        self
    }

    /// Set the initial volume
    #[must_use]
    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.config.initial_volume = volume;
        self
    }

    /// Set the longest accepted metadata frame
    #[must_use]
    pub fn max_metadata_frame(mut self, bytes: usize) -> Self {
        self.config.max_metadata_frame = bytes;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SoundDriftConfig {
        self.config
    }
}
