//! Silence run detection

/// Check whether every sample in the buffer is zero
///
/// A 16-bit sample is zero exactly when both of its bytes are, so this is a
/// byte scan. An empty buffer counts as silent.
#[must_use]
pub fn is_silent(pcm: &[u8]) -> bool {
    pcm.iter().all(|&b| b == 0)
}

/// What to do with a dequeued packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceAction {
    /// Write the packet to the sink
    Play,
    /// Drop the packet and flush the jitter queue
    Flush,
}

/// Counts consecutive silent packets
///
/// The first `threshold` silent packets in a run are played. The next one
/// triggers a flush and restarts the count, so a long run flushes every
/// `threshold + 1` packets. Any non-silent packet resets the count.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    consecutive: u32,
    threshold: u32,
}

impl SilenceDetector {
    /// Create a detector that flushes after `threshold` silent packets
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Record one dequeued packet
    pub fn observe(&mut self, silent: bool) -> SilenceAction {
        if !silent {
            self.consecutive = 0;
            return SilenceAction::Play;
        }

        if self.consecutive >= self.threshold {
            self.consecutive = 0;
            SilenceAction::Flush
        } else {
            self.consecutive += 1;
            SilenceAction::Play
        }
    }

    /// Current run length
    #[must_use]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Forget the current run
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}
