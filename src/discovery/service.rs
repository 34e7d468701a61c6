//! Broadcast probing and announcement collection

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::Stream;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::AddressResolver;
use crate::error::SoundDriftError;
use crate::net;
use crate::protocol::wire;
use crate::types::{DiscoveredServer, SoundDriftConfig};

/// Largest announcement read from the discovery socket
const MAX_ANNOUNCEMENT_SIZE: usize = 4096;

/// Discovered-server channel capacity
const EVENT_BUFFER: usize = 32;

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodically probes for servers and reports their announcements
pub struct DiscoveryService {
    config: SoundDriftConfig,
    resolver: AddressResolver,
    running: Option<Running>,
}

impl DiscoveryService {
    /// Create a stopped service
    #[must_use]
    pub fn new(config: SoundDriftConfig, resolver: AddressResolver) -> Self {
        Self {
            config,
            resolver,
            running: None,
        }
    }

    /// Whether a probe task is active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Open the discovery socket and start probing
    ///
    /// The first probe goes out immediately, then one every probe interval.
    /// The returned stream ends when `stop` is called or the socket fails.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if discovery is already running,
    /// `InvalidParameter` for a zero probe interval, or `TransportBind` if the
    /// socket cannot be opened.
    pub async fn start(&mut self) -> Result<DiscoveryStream, SoundDriftError> {
        self.config.validate()?;
        if self.is_running() {
            return Err(SoundDriftError::InvalidState {
                message: "discovery already running".to_string(),
                current_state: "Running".to_string(),
            });
        }
        self.stop().await;

        let bind = SocketAddr::new(self.config.bind_address, 0);
        let socket = net::bind_broadcast_udp(bind)
            .map_err(|e| SoundDriftError::bind("cannot open discovery socket", e))?;
        tracing::info!(
            "Discovery started on {}",
            socket.local_addr().unwrap_or(bind)
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let probe = ProbeLoop {
            socket,
            resolver: self.resolver.clone(),
            port: self.config.discovery_port,
            interval: self.config.probe_interval,
            known: HashMap::new(),
        };
        let task = tokio::spawn(probe.run(tx, cancel.clone()));

        self.running = Some(Running { cancel, task });
        Ok(DiscoveryStream { rx })
    }

    /// Stop probing and close the socket
    ///
    /// Idempotent. Returns once the socket has been dropped.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                tracing::warn!("Discovery task ended abnormally: {}", e);
            }
            tracing::info!("Discovery stopped");
        }
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

struct ProbeLoop {
    socket: UdpSocket,
    resolver: AddressResolver,
    port: u16,
    interval: Duration,
    known: HashMap<IpAddr, Instant>,
}

impl ProbeLoop {
    async fn run(mut self, tx: mpsc::Sender<DiscoveredServer>, cancel: CancellationToken) {
        let mut probe = tokio::time::interval(self.interval);
        let mut buf = vec![0u8; MAX_ANNOUNCEMENT_SIZE];

        loop {
            let received = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = probe.tick() => {
                    self.send_probes().await;
                    continue;
                }
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, from) = match received {
                Ok(received) => received,
                Err(e) => {
                    tracing::error!("Discovery socket error: {}", e);
                    break;
                }
            };

            let Some(server) = self.accept(&buf[..len], from) else {
                continue;
            };
            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                sent = tx.send(server) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
    }

    async fn send_probes(&self) {
        for address in self.resolver.broadcast_addresses() {
            let target = SocketAddr::new(IpAddr::V4(address), self.port);
            if let Err(e) = self.socket.send_to(wire::DISCOVERY_PROBE, target).await {
                tracing::warn!("Failed to send discovery probe to {}: {}", target, e);
            }
        }
    }

    fn accept(&mut self, payload: &[u8], from: SocketAddr) -> Option<DiscoveredServer> {
        match wire::parse_announcement(payload) {
            Ok(device_name) => {
                let now = Instant::now();
                let first_seen = *self.known.entry(from.ip()).or_insert(now);
                tracing::debug!("Discovered {} at {}", device_name, from.ip());
                Some(DiscoveredServer {
                    address: from.ip(),
                    device_name,
                    first_seen,
                    last_seen: now,
                })
            }
            Err(e) => {
                tracing::debug!("Ignoring datagram from {}: {}", from, e);
                None
            }
        }
    }
}

/// Stream of discovered servers
///
/// Every announcement is reported; deduplication is left to the caller.
pub struct DiscoveryStream {
    rx: mpsc::Receiver<DiscoveredServer>,
}

impl Stream for DiscoveryStream {
    type Item = DiscoveredServer;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
