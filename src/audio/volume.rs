//! Software gain applied to incoming PCM

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Linear gain factor (0.0 = silent, 1.0 = unity, above 1.0 amplifies)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    /// Silence
    pub const MUTE: Self = Self(0.0);
    /// Unity gain, samples pass through unchanged
    pub const UNITY: Self = Self(1.0);

    /// Create a new volume level
    ///
    /// Negative and NaN levels become `MUTE`. There is no upper bound;
    /// amplified samples saturate at the i16 limits.
    #[must_use]
    pub fn new(level: f32) -> Self {
        if level.is_nan() || level <= 0.0 {
            Self::MUTE
        } else {
            Self(level)
        }
    }

    /// Get as f32
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        self.0
    }

    /// Get as percentage of unity
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Saturating float to int conversion is intended"
    )]
    pub fn as_percent(&self) -> u32 {
        (self.0 * 100.0).round() as u32
    }

    /// Create from percentage of unity
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_percent(percent: u32) -> Self {
        Self::new(percent as f32 / 100.0)
    }

    /// Check if unity gain
    #[must_use]
    pub fn is_unity(&self) -> bool {
        (self.0 - 1.0).abs() < f32::EPSILON
    }

    /// Check if muted
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.0 == 0.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::UNITY
    }
}

impl From<f32> for Volume {
    fn from(v: f32) -> Self {
        Self::new(v)
    }
}

/// Volume shared between the caller and the ingest worker
///
/// Stored as the bit pattern of an `f32` so every read observes one whole
/// value written by `set`.
#[derive(Debug, Clone)]
pub struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    /// Create with an initial level
    #[must_use]
    pub fn new(volume: Volume) -> Self {
        Self(Arc::new(AtomicU32::new(volume.as_f32().to_bits())))
    }

    /// Current level
    #[must_use]
    pub fn get(&self) -> Volume {
        Volume(f32::from_bits(self.0.load(Ordering::Acquire)))
    }

    /// Replace the level; applies from the next datagram on
    pub fn set(&self, volume: Volume) {
        self.0.store(volume.as_f32().to_bits(), Ordering::Release);
    }
}

impl Default for SharedVolume {
    fn default() -> Self {
        Self::new(Volume::UNITY)
    }
}

/// Scale one sample, rounding half up and saturating to the i16 range
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Value is clamped to the i16 range first"
)]
pub fn scale_sample(sample: i16, gain: f64) -> i16 {
    let scaled = (f64::from(sample) * gain + 0.5).floor();
    scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Apply `volume` to a buffer of interleaved s16le samples
///
/// Returns a new buffer of the same length. A trailing odd byte is copied
/// through unchanged.
#[must_use]
pub fn apply_volume(pcm: &[u8], volume: Volume) -> Vec<u8> {
    if volume.is_unity() {
        return pcm.to_vec();
    }

    let gain = f64::from(volume.as_f32());
    let mut out = Vec::with_capacity(pcm.len());
    let mut chunks = pcm.chunks_exact(2);
    for pair in &mut chunks {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        out.extend_from_slice(&scale_sample(sample, gain).to_le_bytes());
    }
    out.extend_from_slice(chunks.remainder());
    out
}
