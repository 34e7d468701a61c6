//! Playback sink that records every write

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::audio::{AudioFormat, PlaybackSink, SinkError, SinkProvider};

#[derive(Debug, Default)]
struct LogInner {
    writes: Vec<Vec<u8>>,
    opened: usize,
    closed: usize,
    rejected: usize,
}

/// Shared record of what sinks opened from one provider received
#[derive(Debug, Clone, Default)]
pub struct SinkLog(Arc<Mutex<LogInner>>);

impl SinkLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers written, in order
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Number of buffers written
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Number of sinks opened
    #[must_use]
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of sinks closed
    #[must_use]
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Number of writes refused by failing sinks
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.lock().rejected
    }

    /// Waits until at least `count` buffers have been written.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |log| log.writes.len() >= count)
            .await
    }

    /// Waits until at least `count` sinks have been closed.
    pub async fn wait_for_closed(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |log| log.closed >= count).await
    }

    async fn wait_until(&self, timeout: Duration, done: impl Fn(&LogInner) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if done(&self.lock()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Sink appending every write to a `SinkLog`
#[derive(Debug)]
pub struct RecordingSink {
    log: SinkLog,
    fail_writes: bool,
    closed: bool,
}

impl RecordingSink {
    /// Create a sink recording into `log`
    #[must_use]
    pub fn new(log: SinkLog) -> Self {
        log.lock().opened += 1;
        Self {
            log,
            fail_writes: false,
            closed: false,
        }
    }

    /// Create a sink that rejects every write
    #[must_use]
    pub fn failing(log: SinkLog) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(log)
        }
    }
}

impl PlaybackSink for RecordingSink {
    fn write(&mut self, frames: &[u8]) -> Result<(), SinkError> {
        let mut log = self.log.lock();
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.fail_writes {
            log.rejected += 1;
            return Err(SinkError::StreamError("device unplugged".to_string()));
        }
        log.writes.push(frames.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().closed += 1;
        }
    }
}

/// Provider handing out `RecordingSink`s that share one log
#[derive(Debug, Clone, Default)]
pub struct RecordingSinkProvider {
    log: SinkLog,
    fail_open: bool,
    fail_writes: bool,
}

impl RecordingSinkProvider {
    /// Create a provider with a fresh log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose `open` always fails
    #[must_use]
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Provider whose sinks reject every write
    #[must_use]
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// The shared log
    #[must_use]
    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }
}

impl SinkProvider for RecordingSinkProvider {
    fn open(&self, _format: AudioFormat) -> Result<Box<dyn PlaybackSink>, SinkError> {
        if self.fail_open {
            return Err(SinkError::DeviceNotFound("no test device".to_string()));
        }
        if self.fail_writes {
            Ok(Box::new(RecordingSink::failing(self.log.clone())))
        } else {
            Ok(Box::new(RecordingSink::new(self.log.clone())))
        }
    }
}
