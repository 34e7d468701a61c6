//! TCP metadata connection
//!
//! Bytes read from the socket go through `MetadataCodec`; every complete,
//! well-formed frame becomes one `MetadataEvent::Message` and every discarded
//! frame one `MetadataEvent::Dropped`. Remote close or a socket error produces
//! exactly one `MetadataEvent::Closed`. A local `close()` produces no event.
//! The channel never reconnects by itself.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::MetadataMessage;
use crate::error::{Channel, SoundDriftError};
use crate::protocol::{MetadataCodec, MetadataFrame};
use crate::types::SoundDriftConfig;

/// Read buffer size for the metadata socket
const READ_CHUNK: usize = 4096;

/// Event channel capacity
const EVENT_BUFFER: usize = 64;

/// Events produced by an open metadata channel
#[derive(Debug)]
pub enum MetadataEvent {
    /// A well-formed frame
    Message(MetadataMessage),
    /// A frame was discarded; the channel stays open
    Dropped(SoundDriftError),
    /// The channel ended: `TransportClosed` on a clean EOF, `Network` on a
    /// socket error
    Closed(SoundDriftError),
}

/// Metadata channel statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataStats {
    /// Frames delivered as messages
    pub frames: u64,
    /// Frames dropped as malformed
    pub malformed: u64,
}

#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    malformed: AtomicU64,
}

/// Handle to an open metadata connection
pub struct MetadataChannel {
    peer: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl MetadataChannel {
    /// Connect to the server's metadata port and start reading frames
    ///
    /// # Errors
    ///
    /// Returns `ConnectionTimeout` if the connect does not finish within the
    /// configured timeout, or `ConnectionFailed` if it is refused.
    pub async fn open(
        server: IpAddr,
        config: &SoundDriftConfig,
    ) -> Result<(Self, mpsc::Receiver<MetadataEvent>), SoundDriftError> {
        let peer = SocketAddr::new(server, config.metadata_port);
        tracing::debug!("Connecting metadata channel to {}", peer);

        let stream = tokio::time::timeout(config.connection_timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| SoundDriftError::ConnectionTimeout {
                duration: config.connection_timeout,
            })?
            .map_err(|e| SoundDriftError::ConnectionFailed {
                address: peer.to_string(),
                message: e.to_string(),
                source: Some(e),
            })?;

        tracing::info!("Metadata channel connected to {}", peer);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let codec = MetadataCodec::new().with_max_frame(config.max_metadata_frame);

        let task = tokio::spawn(read_loop(
            stream,
            codec,
            tx,
            cancel.clone(),
            counters.clone(),
        ));

        Ok((
            Self {
                peer,
                cancel,
                task: Some(task),
                counters,
            },
            rx,
        ))
    }

    /// Server address of this channel
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> MetadataStats {
        MetadataStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
        }
    }

    /// Whether `close()` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Destroy the connection
    ///
    /// Idempotent. Returns once the socket has been dropped; no event is
    /// delivered after this is called.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Metadata reader for {} ended abnormally: {}", self.peer, e);
            }
            tracing::debug!("Metadata channel to {} closed", self.peer);
        }
    }
}

impl Drop for MetadataChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_loop(
    mut stream: TcpStream,
    mut codec: MetadataCodec,
    tx: mpsc::Sender<MetadataEvent>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    let mut buf = vec![0u8; READ_CHUNK];

    let error = loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            read = stream.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                tracing::info!("Metadata channel closed by server");
                break SoundDriftError::TransportClosed {
                    channel: Channel::Metadata,
                };
            }
            Ok(n) => {
                codec.feed(&buf[..n]);
                while let Some(frame) = codec.decode() {
                    let event = match frame {
                        MetadataFrame::Message(message) => {
                            counters.frames.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!("Received metadata: {:?}", message.as_value());
                            MetadataEvent::Message(message)
                        }
                        MetadataFrame::Malformed(e) => {
                            counters.malformed.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!("Dropping metadata frame: {}", e);
                            MetadataEvent::Dropped(e)
                        }
                    };
                    let send = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        send = tx.send(event) => send,
                    };
                    if send.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Metadata channel error: {}", e);
                break SoundDriftError::Network(e);
            }
        }
    };

    if !cancel.is_cancelled() {
        let _ = tx.send(MetadataEvent::Closed(error)).await;
    }
}
