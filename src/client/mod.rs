//! Main SoundDrift client implementation

use std::net::IpAddr;

use tokio::sync::{Mutex, broadcast};

use crate::audio::{SinkProvider, Volume};
use crate::connection::{ConnectionSupervisor, SessionEvent, SessionStats, SessionStatus};
use crate::discovery::{AddressResolver, DiscoveryService, DiscoveryStream};
use crate::error::SoundDriftError;
use crate::types::SoundDriftConfig;


/// SoundDrift client: discovery plus one streaming session
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use sounddrift::{SessionEvent, SoundDriftClient, SoundDriftConfig};
/// use sounddrift::audio::NullSinkProvider;
///
/// # async fn example() -> Result<(), sounddrift::SoundDriftError> {
/// let client = SoundDriftClient::new(SoundDriftConfig::default(), NullSinkProvider);
/// let mut events = client.subscribe();
///
/// let mut servers = client.start_discovery().await?;
/// let server = servers.next().await.expect("discovery ended");
/// client.stop_discovery().await;
///
/// client.connect(server.address).await?;
/// while let Ok(event) = events.recv().await {
///     if let SessionEvent::Metadata(message) = event {
///         println!("Now playing: {:?}", message.title());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SoundDriftClient {
    config: SoundDriftConfig,
    supervisor: ConnectionSupervisor,
    discovery: std::sync::Arc<Mutex<DiscoveryService>>,
}

impl SoundDriftClient {
    /// Create a client that opens sinks from `sinks` and discovers through
    /// the OS interface list
    #[must_use]
    pub fn new(config: SoundDriftConfig, sinks: impl SinkProvider) -> Self {
        Self::with_resolver(config, sinks, AddressResolver::new())
    }

    /// Create a client with a custom discovery address resolver
    #[must_use]
    pub fn with_resolver(
        config: SoundDriftConfig,
        sinks: impl SinkProvider,
        resolver: AddressResolver,
    ) -> Self {
        let discovery = DiscoveryService::new(config.clone(), resolver);
        Self {
            supervisor: ConnectionSupervisor::new(config.clone(), sinks),
            discovery: std::sync::Arc::new(Mutex::new(discovery)),
            config,
        }
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &SoundDriftConfig {
        &self.config
    }

    /// Connect to a discovered server, replacing any current session
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or either channel cannot be
    /// opened, and `ConnectCancelled` if `disconnect` interrupts it.
    pub async fn connect(&self, server: IpAddr) -> Result<(), SoundDriftError> {
        self.supervisor.connect(server).await
    }

    /// End the current session; a no-op without one
    pub async fn disconnect(&self) {
        self.supervisor.disconnect().await;
    }

    /// Set playback volume (1.0 = unity)
    pub fn set_volume(&self, volume: f32) {
        self.supervisor.set_volume(volume);
    }

    /// Current volume
    #[must_use]
    pub fn volume(&self) -> Volume {
        self.supervisor.volume()
    }

    /// Current session status
    pub async fn status(&self) -> SessionStatus {
        self.supervisor.status().await
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        self.supervisor.status().await.is_connected()
    }

    /// Statistics of the current session
    pub async fn stats(&self) -> Option<SessionStats> {
        self.supervisor.stats().await
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.supervisor.subscribe()
    }

    /// Start probing for servers
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if discovery is already running.
    pub async fn start_discovery(&self) -> Result<DiscoveryStream, SoundDriftError> {
        self.discovery.lock().await.start().await
    }

    /// Stop probing; idempotent
    pub async fn stop_discovery(&self) {
        self.discovery.lock().await.stop().await;
    }
}
