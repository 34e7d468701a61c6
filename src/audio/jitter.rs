//! Bounded FIFO between the media socket and the sink

use std::collections::VecDeque;

/// Jitter queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitterStats {
    /// Packets pushed
    pub packets_pushed: u64,
    /// Packets dropped to make room (oldest first)
    pub packets_evicted: u64,
    /// Packets discarded by `clear`
    pub packets_cleared: u64,
    /// Current queue depth
    pub current_depth: usize,
}

/// Fixed-capacity FIFO that keeps the most recent packets
///
/// A push into a full queue evicts the oldest entry. Order is otherwise
/// preserved.
#[derive(Debug)]
pub struct JitterQueue<T> {
    packets: VecDeque<T>,
    capacity: usize,
    stats: JitterStats,
}

impl<T> JitterQueue<T> {
    /// Create a queue holding at most `capacity` packets (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            packets: VecDeque::with_capacity(capacity),
            capacity,
            stats: JitterStats::default(),
        }
    }

    /// Append a packet, returning the evicted oldest packet if the queue was full
    pub fn push(&mut self, packet: T) -> Option<T> {
        self.stats.packets_pushed += 1;

        let evicted = if self.packets.len() >= self.capacity {
            self.stats.packets_evicted += 1;
            self.packets.pop_front()
        } else {
            None
        };

        self.packets.push_back(packet);
        self.stats.current_depth = self.packets.len();
        evicted
    }

    /// Remove the oldest packet
    pub fn pop(&mut self) -> Option<T> {
        let packet = self.packets.pop_front();
        self.stats.current_depth = self.packets.len();
        packet
    }

    /// Discard everything, returning how many packets were dropped
    pub fn clear(&mut self) -> usize {
        let cleared = self.packets.len();
        self.packets.clear();
        self.stats.packets_cleared += cleared as u64;
        self.stats.current_depth = 0;
        cleared
    }

    /// Number of queued packets
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Maximum number of queued packets
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get statistics
    #[must_use]
    pub fn stats(&self) -> JitterStats {
        self.stats
    }
}
