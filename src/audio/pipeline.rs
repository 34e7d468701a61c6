//! UDP media ingest
//!
//! One worker task owns the socket reads, the jitter queue, the silence
//! detector, the sink and the last-activity timestamp, so none of them need a
//! lock. Only the volume is shared with the caller.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::format::AudioFormat;
use super::jitter::JitterQueue;
use super::silence::{SilenceAction, SilenceDetector, is_silent};
use super::sink::PlaybackSink;
use super::volume::{SharedVolume, Volume, apply_volume};
use crate::error::SoundDriftError;
use crate::net;
use crate::protocol::wire;
use crate::types::SoundDriftConfig;

/// Largest datagram accepted on the media socket
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Upper bound on the best-effort disconnect send
const DISCONNECT_SEND_TIMEOUT: Duration = Duration::from_millis(250);

/// Pipeline lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not opened
    Idle,
    /// Binding the local media socket
    Binding,
    /// Sending the handshake datagram
    Handshaking,
    /// Receiving media
    Streaming,
    /// Socket released, or the worker stopped
    Closed,
}

/// Session-fatal conditions reported by the worker
#[derive(Debug)]
pub enum PipelineEvent {
    /// No datagram arrived within the liveness timeout
    LivenessLost {
        /// Time since the last datagram
        elapsed: Duration,
    },
    /// The media socket failed
    SocketError(io::Error),
}

impl From<PipelineEvent> for SoundDriftError {
    fn from(event: PipelineEvent) -> Self {
        match event {
            PipelineEvent::LivenessLost { elapsed } => Self::LivenessTimeout { elapsed },
            PipelineEvent::SocketError(e) => Self::Network(e),
        }
    }
}

/// Ingest statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Datagrams received
    pub received: u64,
    /// Packets written to the sink
    pub played: u64,
    /// Packets evicted from a full jitter queue
    pub evicted: u64,
    /// Datagrams dropped for not holding whole frames
    pub malformed: u64,
    /// Silence-triggered queue flushes
    pub silence_flushes: u64,
    /// Sink writes that failed
    pub sink_errors: u64,
    /// Jitter queue depth after the last datagram
    pub queue_depth: usize,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    played: AtomicU64,
    evicted: AtomicU64,
    malformed: AtomicU64,
    silence_flushes: AtomicU64,
    sink_errors: AtomicU64,
    queue_depth: AtomicUsize,
}

/// Handle to an open media session
pub struct AudioIngestPipeline {
    server: SocketAddr,
    local: SocketAddr,
    socket: Option<Arc<UdpSocket>>,
    state: Arc<watch::Sender<PipelineState>>,
    volume: SharedVolume,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl AudioIngestPipeline {
    /// Bind the media socket, send the handshake and start ingesting
    ///
    /// The sink is owned by the worker from here on and closed when the
    /// worker exits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a zero liveness tick, and
    /// `TransportBind` if the socket cannot be bound or the handshake cannot
    /// be sent. The sink is closed on every error and the pipeline is never
    /// left half-open.
    pub async fn open(
        server: IpAddr,
        config: &SoundDriftConfig,
        volume: SharedVolume,
        mut sink: Box<dyn PlaybackSink>,
    ) -> Result<(Self, mpsc::Receiver<PipelineEvent>), SoundDriftError> {
        if let Err(e) = config.validate() {
            sink.close();
            return Err(e);
        }

        let server = SocketAddr::new(server, config.media_server_port);
        let (state, _) = watch::channel(PipelineState::Idle);
        let state = Arc::new(state);

        state.send_replace(PipelineState::Binding);
        let bind_addr = SocketAddr::new(config.bind_address, config.media_bind_port);
        let socket = match net::bind_reusable_udp(bind_addr) {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!("Failed to bind media socket on {}: {}", bind_addr, e);
                sink.close();
                return Err(SoundDriftError::bind(
                    format!("cannot bind media socket on {bind_addr}"),
                    e,
                ));
            }
        };
        let local = socket.local_addr().unwrap_or(bind_addr);
        tracing::info!("Media socket bound on {}", local);

        state.send_replace(PipelineState::Handshaking);
        let handshake = match wire::handshake_datagram(&config.device_info()) {
            Ok(handshake) => handshake,
            Err(e) => {
                sink.close();
                return Err(e);
            }
        };
        if let Err(e) = socket.send_to(&handshake, server).await {
            tracing::error!("Failed to send handshake to {}: {}", server, e);
            sink.close();
            return Err(SoundDriftError::bind(
                format!("handshake send to {server} failed"),
                e,
            ));
        }
        tracing::info!("Handshake sent to {}", server);

        let socket = Arc::new(socket);
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let worker = IngestWorker {
            socket: socket.clone(),
            queue: JitterQueue::new(config.jitter_capacity),
            silence: SilenceDetector::new(config.silence_threshold),
            sink,
            volume: volume.clone(),
            counters: counters.clone(),
            last_activity: Instant::now(),
        };

        state.send_replace(PipelineState::Streaming);
        let task = tokio::spawn(worker.run(
            cancel.clone(),
            tx,
            state.clone(),
            config.liveness_tick,
            config.liveness_timeout,
        ));

        Ok((
            Self {
                server,
                local,
                socket: Some(socket),
                state,
                volume,
                cancel,
                worker: Some(task),
                counters,
            },
            rx,
        ))
    }

    /// Server media address
    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Local media address
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Change the gain applied to subsequent datagrams
    pub fn set_volume(&self, volume: Volume) {
        self.volume.set(volume);
    }

    /// Current gain
    #[must_use]
    pub fn volume(&self) -> Volume {
        self.volume.get()
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            received: c.received.load(Ordering::Relaxed),
            played: c.played.load(Ordering::Relaxed),
            evicted: c.evicted.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            silence_flushes: c.silence_flushes.load(Ordering::Relaxed),
            sink_errors: c.sink_errors.load(Ordering::Relaxed),
            queue_depth: c.queue_depth.load(Ordering::Relaxed),
        }
    }

    /// Stop ingesting, notify the server and release the socket
    ///
    /// Idempotent and infallible. Returns only after the worker has exited
    /// and the socket has been dropped, so the local port is free for the
    /// next session.
    pub async fn close(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };

        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!("Media worker ended abnormally: {}", e);
            }
        }

        match tokio::time::timeout(
            DISCONNECT_SEND_TIMEOUT,
            socket.send_to(wire::DISCONNECT_MARKER, self.server),
        )
        .await
        {
            Ok(Ok(_)) => tracing::debug!("Disconnect marker sent to {}", self.server),
            Ok(Err(e)) => tracing::warn!("Failed to send disconnect marker: {}", e),
            Err(_) => tracing::warn!("Timed out sending disconnect marker"),
        }

        drop(socket);
        self.state.send_replace(PipelineState::Closed);
        tracing::info!("Media socket {} closed", self.local);
    }
}

impl Drop for AudioIngestPipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct IngestWorker {
    socket: Arc<UdpSocket>,
    queue: JitterQueue<Vec<u8>>,
    silence: SilenceDetector,
    sink: Box<dyn PlaybackSink>,
    volume: SharedVolume,
    counters: Arc<Counters>,
    last_activity: Instant,
}

impl IngestWorker {
    async fn run(
        mut self,
        cancel: CancellationToken,
        events: mpsc::Sender<PipelineEvent>,
        state: Arc<watch::Sender<PipelineState>>,
        tick: Duration,
        timeout: Duration,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut liveness = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let event = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break None,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, _)) => self.ingest(&buf[..len]),
                    Err(e) => {
                        tracing::error!("Media socket error: {}", e);
                        break Some(PipelineEvent::SocketError(e));
                    }
                },
                _ = liveness.tick() => {
                    let elapsed = self.last_activity.elapsed();
                    if elapsed > timeout {
                        tracing::warn!("No media received for {:?}", elapsed);
                        break Some(PipelineEvent::LivenessLost { elapsed });
                    }
                }
            }
        };

        self.sink.close();
        if let Some(event) = event {
            state.send_replace(PipelineState::Closed);
            if !cancel.is_cancelled() {
                let _ = events.send(event).await;
            }
        }
    }

    fn ingest(&mut self, datagram: &[u8]) {
        self.last_activity = Instant::now();
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if datagram.is_empty() || !AudioFormat::STREAM.is_whole_frames(datagram.len()) {
            self.counters.malformed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropping {}-byte media datagram", datagram.len());
            return;
        }

        let scaled = apply_volume(datagram, self.volume.get());
        if self.queue.push(scaled).is_some() {
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
        }

        self.drain_one();
        self.counters
            .queue_depth
            .store(self.queue.len(), Ordering::Relaxed);
    }

    fn drain_one(&mut self) {
        let Some(packet) = self.queue.pop() else {
            return;
        };

        match self.silence.observe(is_silent(&packet)) {
            SilenceAction::Flush => {
                let cleared = self.queue.clear();
                self.counters.silence_flushes.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Silence run, flushed {} queued packets", cleared);
            }
            SilenceAction::Play => match self.sink.write(&packet) {
                Ok(()) => {
                    self.counters.played.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.sink_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Sink write failed: {}", e);
                }
            },
        }
    }
}
