//! Session orchestration
//!
//! A session is one `MetadataChannel` plus one `AudioIngestPipeline` against
//! the same server. The session slot is guarded by one async mutex, so
//! connect, caller disconnect and failure-driven disconnect never overlap.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Instant;

use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::{DisconnectReason, SessionEvent, SessionStats, SessionStatus};
use crate::audio::{
    AudioFormat, AudioIngestPipeline, NullSink, PipelineEvent, PlaybackSink, SharedVolume,
    SinkProvider, Volume,
};
use crate::error::{Channel, SoundDriftError};
use crate::metadata::{MetadataChannel, MetadataEvent, MetadataMessage};
use crate::types::SoundDriftConfig;

/// Event channel capacity
const EVENT_BUFFER: usize = 100;

struct Session {
    id: u64,
    server: IpAddr,
    metadata: MetadataChannel,
    pipeline: AudioIngestPipeline,
    monitor: JoinHandle<()>,
    connected_at: Instant,
}

struct Inner {
    config: SoundDriftConfig,
    sinks: Arc<dyn SinkProvider>,
    volume: SharedVolume,
    status: RwLock<SessionStatus>,
    server: RwLock<Option<IpAddr>>,
    session: Mutex<Option<Session>>,
    pending: std::sync::Mutex<CancellationToken>,
    next_id: AtomicU64,
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Owns the single session and derives its status
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

impl ConnectionSupervisor {
    /// Create an idle supervisor
    ///
    /// `sinks` is asked for a fresh `PlaybackSink` on every connect.
    #[must_use]
    pub fn new(config: SoundDriftConfig, sinks: impl SinkProvider) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let volume = SharedVolume::new(Volume::new(config.initial_volume));

        Self {
            inner: Arc::new(Inner {
                config,
                sinks: Arc::new(sinks),
                volume,
                status: RwLock::new(SessionStatus::Idle),
                server: RwLock::new(None),
                session: Mutex::new(None),
                pending: std::sync::Mutex::new(CancellationToken::new()),
                next_id: AtomicU64::new(1),
                event_tx,
            }),
        }
    }

    /// Get current status
    pub async fn status(&self) -> SessionStatus {
        *self.inner.status.read().await
    }

    /// Server of the current or pending session
    pub async fn server(&self) -> Option<IpAddr> {
        *self.inner.server.read().await
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Set the gain for the current and every later session
    pub fn set_volume(&self, volume: f32) {
        let volume = Volume::new(volume);
        tracing::debug!("Volume set to {}", volume.as_f32());
        self.inner.volume.set(volume);
    }

    /// Last volume set
    #[must_use]
    pub fn volume(&self) -> Volume {
        self.inner.volume.get()
    }

    /// Statistics of the current session
    pub async fn stats(&self) -> Option<SessionStats> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|session| SessionStats {
                connected_at: session.connected_at,
                pipeline: session.pipeline.stats(),
                metadata: session.metadata.stats(),
            })
    }

    /// Connect to a server
    ///
    /// Any existing session is fully torn down first, then the settle delay
    /// elapses before both channels are opened concurrently. Status becomes
    /// `Connected` only when both are up.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a config with a zero period, or the
    /// error of the channel that failed to open; the other channel is closed
    /// and a `Disconnected` event is emitted. Returns `ConnectCancelled` when
    /// `disconnect` is called before both channels are up.
    pub async fn connect(&self, server: IpAddr) -> Result<(), SoundDriftError> {
        let inner = &self.inner;
        inner.config.validate()?;

        let mut slot = inner.session.lock().await;
        let cancel = inner.arm_pending();

        if let Some(previous) = slot.take() {
            inner.teardown(previous, DisconnectReason::Replaced).await;
        }

        inner.set_status(SessionStatus::Connecting).await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => return inner.abandon_connect(server).await,
            () = tokio::time::sleep(inner.config.reconnect_settle_delay) => {}
        }
        *inner.server.write().await = Some(server);
        tracing::info!("Connecting to {}", server);

        let sink = inner.open_sink();
        let (metadata, media) = tokio::join!(
            async {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    opened = MetadataChannel::open(server, &inner.config) => Some(opened),
                }
            },
            AudioIngestPipeline::open(server, &inner.config, inner.volume.clone(), sink),
        );

        let cancelled = cancel.is_cancelled();
        let ((metadata, metadata_rx), (pipeline, pipeline_rx)) = match (metadata, media) {
            (Some(Ok(metadata)), Ok(media)) if !cancelled => (metadata, media),
            (metadata, media) => {
                let mut failure = None;
                match metadata {
                    Some(Ok((mut channel, _))) => channel.close().await,
                    Some(Err(e)) => failure = Some(e),
                    None => {}
                }
                match media {
                    Ok((mut pipeline, _)) => pipeline.close().await,
                    Err(e) if failure.is_none() => failure = Some(e),
                    Err(e) => tracing::debug!("Media channel also failed: {}", e),
                }

                return match failure {
                    Some(e) if !cancelled => inner.fail_connect(server, e).await,
                    _ => inner.abandon_connect(server).await,
                };
            }
        };

        // Published before the monitor starts so metadata never precedes it
        inner.set_status(SessionStatus::Connected).await;

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let monitor = tokio::spawn(monitor(
            Arc::downgrade(&self.inner),
            id,
            metadata_rx,
            pipeline_rx,
        ));

        *slot = Some(Session {
            id,
            server,
            metadata,
            pipeline,
            monitor,
            connected_at: Instant::now(),
        });
        tracing::info!("Connected to {}", server);

        Ok(())
    }

    /// Tear the current session down
    ///
    /// Cancels a connect still in progress, which then returns without
    /// reaching `Connected`. A no-op when there is no session. Never fails;
    /// returns once both sockets are released.
    pub async fn disconnect(&self) {
        self.inner.cancel_pending();

        let mut slot = self.inner.session.lock().await;
        if let Some(session) = slot.take() {
            self.inner
                .teardown(session, DisconnectReason::UserRequested)
                .await;
        }
    }
}

impl Inner {
    /// Replace the pending-connect token; called with the slot held
    fn arm_pending(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    fn cancel_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Back out of a connect that never reached `Connected`
    async fn abandon_connect(&self, server: IpAddr) -> Result<(), SoundDriftError> {
        tracing::info!("Connect to {} cancelled", server);
        *self.server.write().await = None;
        self.set_status(SessionStatus::Idle).await;
        self.send_event(SessionEvent::Disconnected {
            server,
            reason: DisconnectReason::UserRequested,
        });
        Err(SoundDriftError::ConnectCancelled {
            address: server.to_string(),
        })
    }

    async fn fail_connect(
        &self,
        server: IpAddr,
        error: SoundDriftError,
    ) -> Result<(), SoundDriftError> {
        tracing::error!("Failed to connect to {}: {}", server, error);
        *self.server.write().await = None;
        self.set_status(SessionStatus::Idle).await;

        let reported = SoundDriftError::ConnectionFailed {
            address: server.to_string(),
            message: error.to_string(),
            source: None,
        };
        self.send_event(SessionEvent::Disconnected {
            server,
            reason: DisconnectReason::ConnectFailed(Arc::new(reported)),
        });
        Err(error)
    }

    fn open_sink(&self) -> Box<dyn PlaybackSink> {
        match self.sinks.open(AudioFormat::STREAM) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!("Playback device unavailable, discarding audio: {}", e);
                Box::new(NullSink::default())
            }
        }
    }

    /// Tear down `id` unless a newer session has replaced it
    async fn disconnect_session(&self, id: u64, reason: DisconnectReason) {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|session| session.id == id) {
            if let Some(session) = slot.take() {
                self.teardown(session, reason).await;
            }
        }
    }

    /// The session has already been taken out of the slot, so nothing can
    /// reach it while it closes
    async fn teardown(&self, mut session: Session, reason: DisconnectReason) {
        self.set_status(SessionStatus::Disconnecting).await;

        session.monitor.abort();
        session.metadata.close().await;
        session.pipeline.close().await;

        *self.server.write().await = None;
        self.set_status(SessionStatus::Idle).await;

        match reason.error() {
            Some(e) if e.is_session_fatal() => {
                tracing::warn!("Disconnected from {}: {}", session.server, e);
            }
            _ => tracing::info!("Disconnected from {}: {:?}", session.server, reason),
        }
        self.send_event(SessionEvent::Disconnected {
            server: session.server,
            reason,
        });
    }

    /// Set session status and emit event
    async fn set_status(&self, new_status: SessionStatus) {
        let old_status = {
            let mut status = self.status.write().await;
            let old = *status;
            *status = new_status;
            old
        };

        if old_status != new_status {
            self.send_event(SessionEvent::StatusChanged {
                old: old_status,
                new: new_status,
                show_metadata: new_status.is_connected(),
            });
        }
    }

    /// Send an event
    fn send_event(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Forwards metadata until a channel fails or goes away, then hands the
/// session to a separate teardown task
async fn monitor(
    inner: Weak<Inner>,
    id: u64,
    metadata_rx: mpsc::Receiver<MetadataEvent>,
    pipeline_rx: mpsc::Receiver<PipelineEvent>,
) {
    let forward = |message| match inner.upgrade() {
        Some(inner) => {
            inner.send_event(SessionEvent::Metadata(message));
            true
        }
        None => false,
    };
    let Some(error) = next_failure(id, metadata_rx, pipeline_rx, forward).await else {
        return;
    };

    tracing::warn!("Session {} lost: {}", id, error);

    // Teardown aborts this task, so it must run elsewhere
    if let Some(inner) = inner.upgrade() {
        tokio::spawn(async move {
            inner
                .disconnect_session(id, DisconnectReason::Failed(Arc::new(error)))
                .await;
        });
    }
}

/// Wait for the first error that ends the session
///
/// Metadata goes to `forward` until it returns false, which means the
/// supervisor is gone. A closed event channel counts as that channel closing.
pub(super) async fn next_failure(
    id: u64,
    mut metadata_rx: mpsc::Receiver<MetadataEvent>,
    mut pipeline_rx: mpsc::Receiver<PipelineEvent>,
    mut forward: impl FnMut(MetadataMessage) -> bool,
) -> Option<SoundDriftError> {
    loop {
        let error = tokio::select! {
            event = metadata_rx.recv() => match event {
                Some(MetadataEvent::Message(message)) => {
                    if !forward(message) {
                        return None;
                    }
                    continue;
                }
                Some(MetadataEvent::Dropped(e) | MetadataEvent::Closed(e)) => e,
                None => SoundDriftError::TransportClosed {
                    channel: Channel::Metadata,
                },
            },
            event = pipeline_rx.recv() => match event {
                Some(event) => event.into(),
                None => SoundDriftError::TransportClosed {
                    channel: Channel::Media,
                },
            },
        };

        if error.is_recoverable() {
            tracing::debug!("Session {}: {}", id, error);
            continue;
        }
        return Some(error);
    }
}
