//! Discover the first SoundDrift server on the network and play its stream
//!
//! Run with `cargo run --example listen --features audio-cpal` to hear audio;
//! without the feature the stream is received and discarded.

use futures::StreamExt;
use sounddrift::{SessionEvent, SoundDriftClient, SoundDriftConfig};
use std::time::Duration;

#[cfg(feature = "audio-cpal")]
fn sinks() -> sounddrift::audio::CpalSinkProvider {
    sounddrift::audio::CpalSinkProvider
}

#[cfg(not(feature = "audio-cpal"))]
fn sinks() -> sounddrift::audio::NullSinkProvider {
    sounddrift::audio::NullSinkProvider
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client = SoundDriftClient::new(SoundDriftConfig::default(), sinks());
    let mut events = client.subscribe();

    println!("Looking for SoundDrift servers...");
    let mut servers = client.start_discovery().await?;
    let server = match tokio::time::timeout(Duration::from_secs(10), servers.next()).await {
        Ok(Some(server)) => server,
        _ => {
            println!("No servers found.");
            return Ok(());
        }
    };
    client.stop_discovery().await;

    println!("Connecting to {} ({})", server.device_name, server.address);
    client.connect(server.address).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                client.disconnect().await;
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Metadata(message)) => {
                    println!(
                        "Now playing: {} - {}",
                        message.artist().unwrap_or("?"),
                        message.title().unwrap_or("?")
                    );
                }
                Ok(SessionEvent::StatusChanged { old, new, .. }) => {
                    println!("Status: {old:?} -> {new:?}");
                }
                Ok(SessionEvent::Disconnected { reason, .. }) => {
                    println!("Disconnected: {reason:?}");
                    break;
                }
                Err(_) => break,
            }
        }
    }

    Ok(())
}
