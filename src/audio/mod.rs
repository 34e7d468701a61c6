//! Audio handling module
//!
//! Media datagrams flow through [`AudioIngestPipeline`]: volume scaling,
//! the bounded [`JitterQueue`], silence detection, then a [`PlaybackSink`].

pub mod format;
pub mod jitter;
pub mod pipeline;
pub mod silence;
pub mod sink;
pub mod sink_cpal;
pub mod volume;


pub use format::AudioFormat;
pub use jitter::{JitterQueue, JitterStats};
pub use pipeline::{AudioIngestPipeline, PipelineEvent, PipelineState, PipelineStats};
pub use silence::{SilenceAction, SilenceDetector, is_silent};
pub use sink::{NullSink, NullSinkProvider, PlaybackSink, SinkError, SinkProvider};
#[cfg(feature = "audio-cpal")]
pub use sink_cpal::{CpalSink, CpalSinkProvider};
pub use volume::{SharedVolume, Volume, apply_volume, scale_sample};
