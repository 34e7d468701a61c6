//! Mock SoundDrift server for testing purposes.
//!
//! Binds the three server sockets on loopback with ephemeral ports: the media
//! socket (records handshakes and disconnect markers, streams PCM back to the
//! last handshake source), the metadata listener (accepts clients and writes
//! newline-delimited JSON to them) and the discovery responder (answers
//! probes with a `deviceName` announcement).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::protocol::wire::{DISCONNECT_MARKER, DISCOVERY_PROBE, HANDSHAKE_MARKER};
use crate::types::{DeviceInfo, SoundDriftConfig, SoundDriftConfigBuilder};

/// Polling interval of the `wait_for_*` helpers
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Configuration for the mock server.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address all sockets bind to.
    pub bind_address: IpAddr,
    /// Name announced to discovery probes.
    pub device_name: String,
    /// Whether to answer discovery probes.
    pub answer_probes: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            device_name: "Mock SoundDrift Server".to_string(),
            answer_probes: true,
        }
    }
}

/// A handshake datagram received on the media socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRecord {
    /// Client media address the handshake came from.
    pub from: SocketAddr,
    /// Identity the client announced.
    pub device: DeviceInfo,
}

#[derive(Default)]
struct ServerState {
    handshakes: Vec<HandshakeRecord>,
    disconnects: Vec<SocketAddr>,
    probes: Vec<SocketAddr>,
    metadata_clients: Vec<TcpStream>,
    metadata_connections: usize,
}

struct Sockets {
    media: Arc<UdpSocket>,
    media_port: u16,
    metadata_port: u16,
    discovery_port: u16,
}

/// A mock SoundDrift server.
pub struct MockServer {
    config: MockServerConfig,
    state: Arc<RwLock<ServerState>>,
    shutdown: CancellationToken,
    sockets: Option<Sockets>,
}

impl MockServer {
    /// Creates a new `MockServer` with the specified configuration.
    #[must_use]
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ServerState::default())),
            shutdown: CancellationToken::new(),
            sockets: None,
        }
    }

    /// Creates a new `MockServer` with default configuration.
    #[must_use]
    pub fn default_server() -> Self {
        Self::new(MockServerConfig::default())
    }

    /// Binds the sockets and spawns the server tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if any socket cannot be bound.
    pub async fn start(&mut self) -> Result<(), std::io::Error> {
        let bind = SocketAddr::new(self.config.bind_address, 0);

        let media = Arc::new(UdpSocket::bind(bind).await?);
        let listener = TcpListener::bind(bind).await?;
        let discovery = UdpSocket::bind(bind).await?;

        let sockets = Sockets {
            media_port: media.local_addr()?.port(),
            metadata_port: listener.local_addr()?.port(),
            discovery_port: discovery.local_addr()?.port(),
            media: media.clone(),
        };

        tokio::spawn(Self::media_loop(
            media,
            self.state.clone(),
            self.shutdown.clone(),
        ));
        tokio::spawn(Self::accept_loop(
            listener,
            self.state.clone(),
            self.shutdown.clone(),
        ));
        if self.config.answer_probes {
            tokio::spawn(Self::discovery_loop(
                discovery,
                self.config.device_name.clone(),
                self.state.clone(),
                self.shutdown.clone(),
            ));
        } else {
            tokio::spawn(Self::discovery_sink(
                discovery,
                self.state.clone(),
                self.shutdown.clone(),
            ));
        }

        tracing::debug!(
            "Mock server on {} (media {}, metadata {}, discovery {})",
            self.config.bind_address,
            sockets.media_port,
            sockets.metadata_port,
            sockets.discovery_port
        );
        self.sockets = Some(sockets);
        Ok(())
    }

    /// Stops all server tasks and drops open metadata connections.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        self.state.write().await.metadata_clients.clear();
    }

    /// Address the server binds to.
    #[must_use]
    pub fn address(&self) -> IpAddr {
        self.config.bind_address
    }

    /// UDP media port (0 before `start`).
    #[must_use]
    pub fn media_port(&self) -> u16 {
        self.sockets.as_ref().map_or(0, |s| s.media_port)
    }

    /// TCP metadata port (0 before `start`).
    #[must_use]
    pub fn metadata_port(&self) -> u16 {
        self.sockets.as_ref().map_or(0, |s| s.metadata_port)
    }

    /// UDP discovery port (0 before `start`).
    #[must_use]
    pub fn discovery_port(&self) -> u16 {
        self.sockets.as_ref().map_or(0, |s| s.discovery_port)
    }

    /// Client configuration pointing at this server, with an ephemeral
    /// local media port.
    #[must_use]
    pub fn client_config(&self) -> SoundDriftConfigBuilder {
        SoundDriftConfig::builder()
            .device_name("Test Client")
            .bind_address(self.config.bind_address)
            .media_bind_port(0)
            .media_server_port(self.media_port())
            .metadata_port(self.metadata_port())
            .discovery_port(self.discovery_port())
            .reconnect_settle_delay(Duration::from_millis(10))
            .connection_timeout(Duration::from_secs(2))
    }

    /// Handshakes received so far.
    pub async fn handshakes(&self) -> Vec<HandshakeRecord> {
        self.state.read().await.handshakes.clone()
    }

    /// Number of disconnect markers received.
    pub async fn disconnect_count(&self) -> usize {
        self.state.read().await.disconnects.len()
    }

    /// Number of discovery probes received.
    pub async fn probe_count(&self) -> usize {
        self.state.read().await.probes.len()
    }

    /// Number of metadata connections accepted.
    pub async fn metadata_connection_count(&self) -> usize {
        self.state.read().await.metadata_connections
    }

    /// Waits until `count` handshakes have arrived; returns the latest.
    pub async fn wait_for_handshakes(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Option<HandshakeRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.state.read().await;
                if state.handshakes.len() >= count {
                    return state.handshakes.last().cloned();
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits until `count` metadata clients are connected.
    pub async fn wait_for_metadata_clients(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.state.read().await.metadata_clients.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits until `count` disconnect markers have arrived.
    pub async fn wait_for_disconnects(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.disconnect_count().await >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Sends one PCM datagram to the client of the latest handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if no handshake has been received or the send fails.
    pub async fn send_audio(&self, pcm: &[u8]) -> Result<(), std::io::Error> {
        let target = self
            .state
            .read()
            .await
            .handshakes
            .last()
            .map(|h| h.from)
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotConnected, "no client handshake")
            })?;
        let media = self
            .sockets
            .as_ref()
            .map(|s| s.media.clone())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "not started"))?;
        media.send_to(pcm, target).await?;
        Ok(())
    }

    /// Writes one metadata frame (JSON plus `\n`) to every connected client.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    pub async fn send_metadata(&self, value: &serde_json::Value) -> Result<(), std::io::Error> {
        let mut frame = value.to_string().into_bytes();
        frame.push(b'\n');
        self.send_metadata_raw(&frame).await
    }

    /// Writes raw bytes to every connected metadata client.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    pub async fn send_metadata_raw(&self, bytes: &[u8]) -> Result<(), std::io::Error> {
        let mut state = self.state.write().await;
        for client in &mut state.metadata_clients {
            client.write_all(bytes).await?;
            client.flush().await?;
        }
        Ok(())
    }

    /// Closes every metadata connection from the server side.
    pub async fn close_metadata_clients(&self) {
        self.state.write().await.metadata_clients.clear();
    }

    async fn media_loop(
        socket: Arc<UdpSocket>,
        state: Arc<RwLock<ServerState>>,
        shutdown: CancellationToken,
    ) {
        let mut buf = vec![0u8; 65_536];
        loop {
            let (len, from) = tokio::select! {
                () = shutdown.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::error!("Mock media socket error: {}", e);
                        break;
                    }
                },
            };

            let datagram = &buf[..len];
            if datagram == DISCONNECT_MARKER {
                state.write().await.disconnects.push(from);
            } else if let Some(json) = datagram.strip_prefix(HANDSHAKE_MARKER.as_bytes()) {
                match serde_json::from_slice::<DeviceInfo>(json) {
                    Ok(device) => state
                        .write()
                        .await
                        .handshakes
                        .push(HandshakeRecord { from, device }),
                    Err(e) => tracing::warn!("Mock server got bad handshake: {}", e),
                }
            } else {
                tracing::debug!("Mock server ignoring {} bytes from {}", len, from);
            }
        }
    }

    async fn accept_loop(
        listener: TcpListener,
        state: Arc<RwLock<ServerState>>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let mut state = state.write().await;
                        state.metadata_clients.push(stream);
                        state.metadata_connections += 1;
                    }
                    Err(e) => tracing::error!("Accept error: {}", e),
                },
            }
        }
    }

    async fn discovery_loop(
        socket: UdpSocket,
        device_name: String,
        state: Arc<RwLock<ServerState>>,
        shutdown: CancellationToken,
    ) {
        let announcement = serde_json::json!({ "deviceName": device_name }).to_string();
        let mut buf = [0u8; 1024];
        loop {
            let (len, from) = tokio::select! {
                () = shutdown.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(_) => break,
                },
            };

            if &buf[..len] == DISCOVERY_PROBE {
                state.write().await.probes.push(from);
                if let Err(e) = socket.send_to(announcement.as_bytes(), from).await {
                    tracing::warn!("Mock server failed to announce: {}", e);
                }
            }
        }
    }

    async fn discovery_sink(
        socket: UdpSocket,
        state: Arc<RwLock<ServerState>>,
        shutdown: CancellationToken,
    ) {
        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) if &buf[..len] == DISCOVERY_PROBE => {
                        state.write().await.probes.push(from);
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
