//! CPAL-based playback sink
//!
//! Plays through the default output device of the `cpal` host. The stream
//! lives on its own thread because `cpal::Stream` is not `Send`; writes push
//! decoded samples into a shared ring that the device callback drains.

#[cfg(feature = "audio-cpal")]
mod implementation {
    use super::super::format::AudioFormat;
    use super::super::sink::{PlaybackSink, SinkError, SinkProvider};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, mpsc};
    use std::thread;

    /// Samples buffered ahead of the device before the oldest are dropped
    const MAX_BUFFERED_SECONDS: usize = 1;

    type SampleRing = Arc<Mutex<VecDeque<i16>>>;

    /// Sink writing to the default `cpal` output device
    pub struct CpalSink {
        samples: SampleRing,
        max_samples: usize,
        format: AudioFormat,
        stop_tx: Option<mpsc::Sender<()>>,
        thread: Option<thread::JoinHandle<()>>,
    }

    impl CpalSink {
        /// Open the default output device for `format`
        ///
        /// # Errors
        ///
        /// Returns `SinkError` if there is no output device, or it rejects
        /// the stream configuration.
        pub fn open(format: AudioFormat) -> Result<Self, SinkError> {
            if format.bits_per_sample != 16 {
                return Err(SinkError::FormatNotSupported(format));
            }

            let samples: SampleRing = Arc::new(Mutex::new(VecDeque::new()));
            let max_samples =
                format.sample_rate as usize * usize::from(format.channels) * MAX_BUFFERED_SECONDS;

            let (stop_tx, stop_rx) = mpsc::channel();
            let (status_tx, status_rx) = mpsc::channel();
            let ring = samples.clone();

            let thread = thread::spawn(move || {
                let stream = match build_stream(format, ring) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = status_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = status_tx.send(Err(SinkError::StreamError(e.to_string())));
                    return;
                }

                if status_tx.send(Ok(())).is_err() {
                    return;
                }

                // Block until close; dropping the stream stops the device
                let _ = stop_rx.recv();
            });

            status_rx
                .recv()
                .map_err(|_| SinkError::StreamError("Audio thread panicked".into()))??;

            tracing::info!(
                "Opened CPAL sink at {} Hz, {} channels",
                format.sample_rate,
                format.channels
            );

            Ok(Self {
                samples,
                max_samples,
                format,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            })
        }
    }

    fn build_stream(format: AudioFormat, ring: SampleRing) -> Result<cpal::Stream, SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::DeviceNotFound("No default device".into()))?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut ring) = ring.lock() else {
                        data.fill(0);
                        return;
                    };
                    for sample in data.iter_mut() {
                        *sample = ring.pop_front().unwrap_or(0);
                    }
                },
                |err| tracing::error!("CPAL stream error: {}", err),
                None,
            )
            .map_err(|e| SinkError::StreamError(e.to_string()))
    }

    impl PlaybackSink for CpalSink {
        fn write(&mut self, frames: &[u8]) -> Result<(), SinkError> {
            if self.stop_tx.is_none() {
                return Err(SinkError::Closed);
            }

            let mut ring = self
                .samples
                .lock()
                .map_err(|_| SinkError::StreamError("Sample buffer poisoned".into()))?;

            ring.extend(
                frames
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
            );

            let excess = ring.len().saturating_sub(self.max_samples);
            if excess > 0 {
                tracing::debug!("CPAL sink behind, dropping {} samples", excess);
                ring.drain(..excess);
            }

            Ok(())
        }

        fn format(&self) -> AudioFormat {
            self.format
        }

        fn close(&mut self) {
            if let Some(tx) = self.stop_tx.take() {
                let _ = tx.send(());
            }
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    impl Drop for CpalSink {
        fn drop(&mut self) {
            self.close();
        }
    }

    /// Provider opening a `CpalSink` per session
    #[derive(Debug, Clone, Copy, Default)]
    pub struct CpalSinkProvider;

    impl SinkProvider for CpalSinkProvider {
        fn open(&self, format: AudioFormat) -> Result<Box<dyn PlaybackSink>, SinkError> {
            Ok(Box::new(CpalSink::open(format)?))
        }
    }
}

#[cfg(feature = "audio-cpal")]
pub use implementation::{CpalSink, CpalSinkProvider};
