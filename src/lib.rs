//! # sounddrift
//!
//! A pure Rust client for joining a SoundDrift live audio stream on the local
//! network.
//!
//! ## Features
//!
//! - Server discovery via UDP broadcast probes
//! - Two-channel session: unreliable PCM media over UDP, reliable metadata over TCP
//! - Bounded jitter queue with silence-driven fast recovery
//! - Lossless-except-clamping volume scaling
//! - Liveness monitoring and deterministic teardown
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use sounddrift::{SoundDriftClient, SoundDriftConfig};
//! use sounddrift::audio::NullSinkProvider;
//!
//! # async fn example() -> Result<(), sounddrift::SoundDriftError> {
//! let client = SoundDriftClient::new(SoundDriftConfig::default(), NullSinkProvider);
//!
//! let mut servers = client.start_discovery().await?;
//! if let Some(server) = servers.next().await {
//!     client.connect(server.address).await?;
//!     client.set_volume(0.5);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **High-level**: `SoundDriftClient` - the four external controls
//! - **Mid-level**: `ConnectionSupervisor`, `DiscoveryService`
//! - **Low-level**: `MetadataChannel`, `AudioIngestPipeline`, protocol codecs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod audio;
mod client;
pub mod connection;
pub mod discovery;
pub mod metadata;
pub mod net;
pub mod protocol;

// Re-exports
pub use audio::{PlaybackSink, SinkProvider, Volume};
pub use client::SoundDriftClient;
pub use connection::{ConnectionSupervisor, DisconnectReason, SessionEvent, SessionStatus};
pub use discovery::{AddressResolver, DiscoveryService, DiscoveryStream};
pub use error::SoundDriftError;
pub use metadata::{MetadataChannel, MetadataMessage};
pub use types::{DiscoveredServer, SoundDriftConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        DiscoveredServer, SessionEvent, SessionStatus, SoundDriftClient, SoundDriftConfig,
        SoundDriftError, Volume,
    };
}
