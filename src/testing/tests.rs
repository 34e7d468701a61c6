use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};

use super::*;
use crate::audio::{AudioFormat, PlaybackSink, SinkProvider};
use crate::discovery::InterfaceProvider;
use crate::protocol::wire;
use crate::types::DeviceInfo;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_mock_server_starts() {
    let mut server = MockServer::default_server();
    assert_eq!(server.media_port(), 0);

    server.start().await.unwrap();

    assert!(server.media_port() > 0);
    assert!(server.metadata_port() > 0);
    assert!(server.discovery_port() > 0);

    server.stop().await;
}

#[tokio::test]
async fn test_mock_server_records_handshake_and_disconnect() {
    let mut server = MockServer::default_server();
    server.start().await.unwrap();

    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let target = (server.address(), server.media_port());
    let handshake = wire::handshake_datagram(&DeviceInfo::named("Probe")).unwrap();
    client.send_to(&handshake, target).await.unwrap();

    let record = server.wait_for_handshakes(1, WAIT).await.unwrap();
    assert_eq!(record.from, client.local_addr().unwrap());
    assert_eq!(record.device, DeviceInfo::named("Probe"));

    server.send_audio(&pcm_frames(4, 7)).await.unwrap();
    let mut buf = [0u8; 64];
    let (n, _) = client.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], pcm_frames(4, 7).as_slice());

    client.send_to(wire::DISCONNECT_MARKER, target).await.unwrap();
    assert!(server.wait_for_disconnects(1, WAIT).await);

    server.stop().await;
}

#[tokio::test]
async fn test_mock_server_answers_probe() {
    let mut server = MockServer::new(MockServerConfig {
        device_name: "Attic".to_string(),
        ..MockServerConfig::default()
    });
    server.start().await.unwrap();

    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    client
        .send_to(wire::DISCOVERY_PROBE, (server.address(), server.discovery_port()))
        .await
        .unwrap();

    let mut buf = [0u8; 256];
    let (n, _) = tokio::time::timeout(WAIT, client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wire::parse_announcement(&buf[..n]).unwrap(), "Attic");
    assert_eq!(server.probe_count().await, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_mock_server_metadata_frames() {
    let mut server = MockServer::default_server();
    server.start().await.unwrap();

    let mut client = TcpStream::connect((server.address(), server.metadata_port()))
        .await
        .unwrap();
    assert!(server.wait_for_metadata_clients(1, WAIT).await);

    server
        .send_metadata(&serde_json::json!({ "title": "Song" }))
        .await
        .unwrap();

    let mut buf = [0u8; 64];
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"{\"title\":\"Song\"}\n");

    server.close_metadata_clients().await;
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);

    server.stop().await;
}

#[test]
fn test_recording_sink_log() {
    let provider = RecordingSinkProvider::new();
    let log = provider.log();

    let mut sink = provider.open(AudioFormat::STREAM).unwrap();
    sink.write(&[1, 2, 3, 4]).unwrap();
    sink.close();
    sink.close();

    assert_eq!(log.writes(), vec![vec![1, 2, 3, 4]]);
    assert_eq!(log.opened(), 1);
    assert_eq!(log.closed(), 1);
    assert!(sink.write(&[0, 0, 0, 0]).is_err());
}

#[test]
fn test_recording_sink_failures() {
    assert!(RecordingSinkProvider::failing_open()
        .open(AudioFormat::STREAM)
        .is_err());

    let provider = RecordingSinkProvider::failing_writes();
    let mut sink = provider.open(AudioFormat::STREAM).unwrap();
    assert!(sink.write(&[0, 1, 0, 1]).is_err());
    assert_eq!(provider.log().rejected(), 1);
    assert_eq!(provider.log().write_count(), 0);
}

#[test]
fn test_static_interfaces() {
    let provider = StaticInterfaces::none()
        .with("eth0", Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(255, 0, 0, 0))
        .with_loopback();
    let interfaces = provider.interfaces().unwrap();

    assert_eq!(interfaces.len(), 2);
    assert!(!interfaces[0].is_loopback);
    assert!(interfaces[1].is_loopback);
    assert!(StaticInterfaces::failing().interfaces().is_err());
}

#[test]
fn test_pcm_helpers() {
    assert_eq!(pcm_frames(2, 0x0102), vec![2, 1, 2, 1, 2, 1, 2, 1]);
    assert_eq!(silent_frames(3).len(), 12);
}

#[test]
fn test_network_sim_shape() {
    let datagrams: Vec<Vec<u8>> = (0u8..100).map(|i| vec![i]).collect();

    let perfect = NetworkSimulator::perfect().shape(datagrams.clone(), 1);
    assert_eq!(perfect, datagrams);

    let lossy = NetworkSimulator::stress_test().shape(datagrams.clone(), 7);
    assert!(lossy.len() < datagrams.len());
    assert_eq!(lossy, NetworkSimulator::stress_test().shape(datagrams.clone(), 7));

    // Reordering only swaps neighbours, never loses or invents datagrams
    let shuffled = NetworkSimulator {
        loss_rate: 0.0,
        reorder_rate: 1.0,
    }
    .shape(datagrams.clone(), 3);
    assert_eq!(shuffled.len(), datagrams.len());
    assert_eq!(shuffled[0], datagrams[1]);
    assert_eq!(shuffled[1], datagrams[0]);
}
