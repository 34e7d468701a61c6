//! Playback sink abstraction
//!
//! A sink accepts whole s16le frames in arrival order. Writes must not block
//! for long; a sink that cannot keep up drops data itself. Device faults that
//! surface asynchronously are logged by the sink and never end the session.

use super::format::AudioFormat;

/// Errors from a playback sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Format not supported
    #[error("Format not supported: {0:?}")]
    FormatNotSupported(AudioFormat),

    /// Stream error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Sink closed
    #[error("Sink closed")]
    Closed,
}

/// Destination for scaled PCM
pub trait PlaybackSink: Send {
    /// Queue frames for playback
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the device rejected the write. The caller
    /// drops the packet and keeps streaming.
    fn write(&mut self, frames: &[u8]) -> Result<(), SinkError>;

    /// Format the sink was opened with
    fn format(&self) -> AudioFormat {
        AudioFormat::STREAM
    }

    /// Release the device. Called once when the session ends.
    fn close(&mut self) {}
}

/// Opens a fresh sink for each session
pub trait SinkProvider: Send + Sync + 'static {
    /// Open a sink for `format`
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if no device can be opened.
    fn open(&self, format: AudioFormat) -> Result<Box<dyn PlaybackSink>, SinkError>;
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink {
    bytes: u64,
}

impl NullSink {
    /// Bytes accepted so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl PlaybackSink for NullSink {
    fn write(&mut self, frames: &[u8]) -> Result<(), SinkError> {
        self.bytes += frames.len() as u64;
        Ok(())
    }
}

/// Provider of `NullSink`s, for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSinkProvider;

impl SinkProvider for NullSinkProvider {
    fn open(&self, _format: AudioFormat) -> Result<Box<dyn PlaybackSink>, SinkError> {
        Ok(Box::new(NullSink::default()))
    }
}

impl From<SinkError> for crate::error::SoundDriftError {
    fn from(e: SinkError) -> Self {
        Self::SinkWrite {
            message: e.to_string(),
        }
    }
}
