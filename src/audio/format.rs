//! Stream format definitions

use std::time::Duration;

/// PCM layout carried by media datagrams
///
/// The server always sends interleaved signed 16-bit little-endian samples;
/// the fields exist so sinks can describe what they were opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Bits per sample (always 16 on the wire)
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// 44.1kHz stereo s16le, the only format the server emits
    pub const STREAM: Self = Self {
        sample_rate: 44_100,
        channels: 2,
        bits_per_sample: 16,
    };

    /// Bytes in one sample of one channel
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Get bytes per frame (all channels for one sample)
    #[must_use]
    pub fn bytes_per_frame(self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Get bytes per second
    #[must_use]
    pub fn bytes_per_second(self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }

    /// Whether `len` bytes hold a whole number of frames
    #[must_use]
    pub fn is_whole_frames(self, len: usize) -> bool {
        let frame = self.bytes_per_frame();
        frame != 0 && len % frame == 0
    }

    /// Playback duration of `len` bytes
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn duration_of(self, len: usize) -> Duration {
        let frames = len / self.bytes_per_frame().max(1);
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::STREAM
    }
}
