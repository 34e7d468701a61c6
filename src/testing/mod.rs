//! Test helpers: a loopback mock server, a recording sink and fixed
//! interface lists.

pub mod interfaces;
pub mod mock_server;
pub mod network_sim;
pub mod recording_sink;
#[cfg(test)]
/// Unit tests for the test helpers.
pub mod tests;

pub use interfaces::StaticInterfaces;
pub use mock_server::{HandshakeRecord, MockServer, MockServerConfig};
pub use network_sim::NetworkSimulator;
pub use recording_sink::{RecordingSink, RecordingSinkProvider, SinkLog};

/// Interleaved stereo s16le PCM: `frames` frames of the given sample value
#[must_use]
pub fn pcm_frames(frames: usize, sample: i16) -> Vec<u8> {
    let bytes = sample.to_le_bytes();
    std::iter::repeat_n(bytes, frames * 2).flatten().collect()
}

/// All-zero PCM of `frames` stereo frames
#[must_use]
pub fn silent_frames(frames: usize) -> Vec<u8> {
    vec![0u8; frames * 4]
}
