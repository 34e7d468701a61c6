use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::audio::{
    AudioFormat, AudioIngestPipeline, PipelineEvent, PipelineState, PipelineStats, PlaybackSink,
    SharedVolume, SinkError, Volume,
};
use crate::error::SoundDriftError;
use crate::protocol::wire;
use crate::testing::{RecordingSink, SinkLog, pcm_frames, silent_frames};
use crate::types::SoundDriftConfig;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    server: UdpSocket,
    client: SocketAddr,
    pipeline: AudioIngestPipeline,
    events: mpsc::Receiver<PipelineEvent>,
    log: SinkLog,
}

fn config_for(server: &UdpSocket) -> SoundDriftConfig {
    SoundDriftConfig::builder()
        .device_name("Pipeline Test")
        .bind_address(LOCALHOST)
        .media_bind_port(0)
        .media_server_port(server.local_addr().unwrap().port())
        .build()
}

/// Records like `RecordingSink` but claims a mono device layout
struct MonoSink(RecordingSink);

impl PlaybackSink for MonoSink {
    fn write(&mut self, frames: &[u8]) -> Result<(), SinkError> {
        self.0.write(frames)
    }

    fn format(&self) -> AudioFormat {
        AudioFormat {
            channels: 1,
            ..AudioFormat::STREAM
        }
    }

    fn close(&mut self) {
        self.0.close();
    }
}

async fn open_with(config: SoundDriftConfig, server: UdpSocket, volume: Volume) -> Harness {
    let log = SinkLog::default();
    let sink = Box::new(RecordingSink::new(log.clone()));
    open_with_sink(config, server, volume, sink, log).await
}

async fn open_with_sink(
    config: SoundDriftConfig,
    server: UdpSocket,
    volume: Volume,
    sink: Box<dyn PlaybackSink>,
    log: SinkLog,
) -> Harness {
    let (pipeline, events) =
        AudioIngestPipeline::open(LOCALHOST, &config, SharedVolume::new(volume), sink)
            .await
            .unwrap();

    let mut buf = [0u8; 256];
    let (n, client) = tokio::time::timeout(WAIT, server.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert!(buf[..n].starts_with(wire::HANDSHAKE_MARKER.as_bytes()));

    Harness {
        server,
        client,
        pipeline,
        events,
        log,
    }
}

async fn open(volume: Volume) -> Harness {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = config_for(&server);
    open_with(config, server, volume).await
}

impl Harness {
    async fn send(&self, datagram: &[u8]) {
        self.server.send_to(datagram, self.client).await.unwrap();
    }

    async fn wait_received(&self, count: u64) -> PipelineStats {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let stats = self.pipeline.stats();
            if stats.received >= count {
                return stats;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "only {} of {} datagrams arrived",
                stats.received,
                count
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[tokio::test]
async fn test_open_sends_handshake_and_streams() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = config_for(&server);
    let log = SinkLog::default();
    let (mut pipeline, _events) = AudioIngestPipeline::open(
        LOCALHOST,
        &config,
        SharedVolume::default(),
        Box::new(RecordingSink::new(log)),
    )
    .await
    .unwrap();

    let mut buf = [0u8; 256];
    let (n, from) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(
        &buf[..n],
        br#"SoundDriftConnectionRequest|{"deviceName":"Pipeline Test"}"#
    );
    assert_eq!(from, pipeline.local_addr());
    assert_eq!(pipeline.state(), PipelineState::Streaming);
    assert_eq!(
        pipeline.server(),
        SocketAddr::new(LOCALHOST, server.local_addr().unwrap().port())
    );

    pipeline.close().await;
}

#[tokio::test]
async fn test_packets_played_in_arrival_order() {
    let mut h = open(Volume::new(0.5)).await;

    for i in 1..=10i16 {
        h.send(&pcm_frames(64, i * 100)).await;
    }
    let stats = h.wait_received(10).await;

    let expected: Vec<Vec<u8>> = (1..=10i16).map(|i| pcm_frames(64, i * 50)).collect();
    assert_eq!(h.log.writes(), expected);
    assert_eq!(stats.played, 10);
    assert_eq!(stats.queue_depth, 0);
    assert_eq!(stats.evicted, 0);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_silence_run_flushes_sixth_packet() {
    let mut h = open(Volume::UNITY).await;

    for _ in 0..6 {
        h.send(&silent_frames(64)).await;
    }
    let stats = h.wait_received(6).await;

    assert_eq!(h.log.write_count(), 5);
    assert_eq!(stats.played, 5);
    assert_eq!(stats.silence_flushes, 1);
    assert_eq!(stats.queue_depth, 0);

    // Sound after the run plays normally
    h.send(&pcm_frames(64, 1)).await;
    h.wait_received(7).await;
    assert_eq!(h.log.write_count(), 6);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_malformed_datagrams_dropped() {
    let mut h = open(Volume::UNITY).await;

    h.send(&[1, 2, 3]).await;
    h.send(&[1, 2]).await;
    h.send(&[]).await;
    h.send(&pcm_frames(4, 9)).await;
    let stats = h.wait_received(4).await;

    assert_eq!(stats.malformed, 3);
    assert_eq!(stats.played, 1);
    assert_eq!(h.log.writes(), vec![pcm_frames(4, 9)]);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_volume_change_applies_to_next_datagram() {
    let mut h = open(Volume::UNITY).await;

    h.send(&pcm_frames(2, 1000)).await;
    h.wait_received(1).await;

    h.pipeline.set_volume(Volume::new(0.1));
    h.send(&pcm_frames(2, 1000)).await;
    h.wait_received(2).await;

    assert_eq!(h.log.writes(), vec![pcm_frames(2, 1000), pcm_frames(2, 100)]);
    assert!((h.pipeline.volume().as_f32() - 0.1).abs() < f32::EPSILON);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_sink_errors_do_not_stop_stream() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = config_for(&server);
    let log = SinkLog::default();
    let (mut pipeline, _events) = AudioIngestPipeline::open(
        LOCALHOST,
        &config,
        SharedVolume::default(),
        Box::new(RecordingSink::failing(log.clone())),
    )
    .await
    .unwrap();

    let mut buf = [0u8; 256];
    let (_, client) = server.recv_from(&mut buf).await.unwrap();
    for _ in 0..3 {
        server.send_to(&pcm_frames(8, 5), client).await.unwrap();
    }

    let deadline = tokio::time::Instant::now() + WAIT;
    while pipeline.stats().received < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let stats = pipeline.stats();
    assert_eq!(stats.sink_errors, 3);
    assert_eq!(stats.played, 0);
    assert_eq!(log.rejected(), 3);
    assert_eq!(pipeline.state(), PipelineState::Streaming);

    pipeline.close().await;
}

#[tokio::test]
async fn test_liveness_lost_after_quiet_period() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = SoundDriftConfig {
        liveness_tick: Duration::from_millis(20),
        liveness_timeout: Duration::from_millis(120),
        ..config_for(&server)
    };
    let mut h = open_with(config, server, Volume::UNITY).await;
    let mut state = h.pipeline.watch_state();

    let event = tokio::time::timeout(WAIT, h.events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        PipelineEvent::LivenessLost { elapsed } => {
            assert!(elapsed > Duration::from_millis(120));
        }
        other @ PipelineEvent::SocketError(_) => panic!("unexpected event: {other:?}"),
    }

    state
        .wait_for(|s| *s == PipelineState::Closed)
        .await
        .unwrap();
    assert!(h.log.wait_for_closed(1, WAIT).await);

    // Close after the worker has stopped still notifies the server once
    h.pipeline.close().await;
    let mut buf = [0u8; 64];
    let (n, _) = h.server.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], wire::DISCONNECT_MARKER);
}

#[tokio::test]
async fn test_traffic_keeps_session_alive() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = SoundDriftConfig {
        liveness_tick: Duration::from_millis(20),
        liveness_timeout: Duration::from_millis(150),
        ..config_for(&server)
    };
    let mut h = open_with(config, server, Volume::UNITY).await;

    for _ in 0..12 {
        h.send(&pcm_frames(16, 3)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    assert!(h.events.try_recv().is_err());
    assert_eq!(h.pipeline.state(), PipelineState::Streaming);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_close_is_idempotent_and_releases_port() {
    let mut h = open(Volume::UNITY).await;
    let local = h.pipeline.local_addr();

    h.pipeline.close().await;
    h.pipeline.close().await;
    assert_eq!(h.pipeline.state(), PipelineState::Closed);
    assert!(h.log.wait_for_closed(1, WAIT).await);

    let mut buf = [0u8; 64];
    let (n, from) = h.server.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], wire::DISCONNECT_MARKER);
    assert_eq!(from, local);

    // Exactly one marker
    let second = tokio::time::timeout(Duration::from_millis(100), h.server.recv_from(&mut buf)).await;
    assert!(second.is_err());

    // No event is delivered for a local close
    assert!(h.events.recv().await.is_none());

    // The port is free again
    let rebound = std::net::UdpSocket::bind(local).unwrap();
    drop(rebound);
}

#[tokio::test]
async fn test_bind_failure_is_transport_bind() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let taken = std::net::UdpSocket::bind((LOCALHOST, 0)).unwrap();
    let config = SoundDriftConfig {
        media_bind_port: taken.local_addr().unwrap().port(),
        ..config_for(&server)
    };

    let log = SinkLog::default();
    let result = AudioIngestPipeline::open(
        LOCALHOST,
        &config,
        SharedVolume::default(),
        Box::new(RecordingSink::new(log.clone())),
    )
    .await;

    assert!(matches!(result, Err(SoundDriftError::TransportBind { .. })));
    assert_eq!(log.closed(), 1);
}

#[tokio::test]
async fn test_frame_check_ignores_sink_layout() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = config_for(&server);
    let log = SinkLog::default();
    let sink = Box::new(MonoSink(RecordingSink::new(log.clone())));
    let mut h = open_with_sink(config, server, Volume::UNITY, sink, log).await;

    // Whole mono frames are still half stereo frames on the wire
    h.send(&[1, 0]).await;
    h.send(&[1, 0, 2, 0, 3, 0]).await;
    h.send(&pcm_frames(2, 5)).await;
    let stats = h.wait_received(3).await;

    assert_eq!(stats.malformed, 2);
    assert_eq!(h.log.writes(), vec![pcm_frames(2, 5)]);

    h.pipeline.close().await;
}

#[tokio::test]
async fn test_zero_liveness_tick_rejected() {
    let server = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let config = SoundDriftConfig {
        liveness_tick: Duration::ZERO,
        ..config_for(&server)
    };

    let log = SinkLog::default();
    let result = AudioIngestPipeline::open(
        LOCALHOST,
        &config,
        SharedVolume::default(),
        Box::new(RecordingSink::new(log.clone())),
    )
    .await;

    assert!(matches!(
        result,
        Err(SoundDriftError::InvalidParameter { .. })
    ));
    assert_eq!(log.closed(), 1);

    // Nothing was sent to the server
    let mut buf = [0u8; 64];
    let quiet = tokio::time::timeout(Duration::from_millis(100), server.recv_from(&mut buf)).await;
    assert!(quiet.is_err());
}

#[test]
fn test_pipeline_event_into_error() {
    let err: SoundDriftError = PipelineEvent::LivenessLost {
        elapsed: Duration::from_secs(6),
    }
    .into();
    assert!(matches!(err, SoundDriftError::LivenessTimeout { .. }));
    assert!(err.is_session_fatal());

    let err: SoundDriftError =
        PipelineEvent::SocketError(std::io::Error::other("network down")).into();
    assert!(matches!(err, SoundDriftError::Network(_)));
}
