use bytes::BytesMut;

use crate::error::SoundDriftError;
use crate::metadata::MetadataMessage;

/// One newline-delimited unit taken off the metadata stream
#[derive(Debug)]
pub enum MetadataFrame {
    /// A frame that parsed as JSON
    Message(MetadataMessage),
    /// A frame that was dropped (invalid JSON, or longer than the frame limit)
    Malformed(SoundDriftError),
}

/// Sans-IO codec for the line-delimited JSON metadata stream
///
/// Feed bytes with `feed()` as they arrive, then call `decode()` until it
/// returns `None`. Bytes after the last newline are kept for the next feed, so
/// a frame split across reads is reassembled.
pub struct MetadataCodec {
    /// Bytes after the last consumed newline
    buffer: BytesMut,
    /// Longest frame accepted before a newline must appear
    max_frame: usize,
    /// Inside an overlong frame; skip until the next newline
    discarding: bool,
}

impl MetadataCodec {
    /// Create a new codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame: 64 * 1024, // 64KB
            discarding: false,
        }
    }

    /// Set maximum frame size
    #[must_use]
    pub fn with_max_frame(mut self, size: usize) -> Self {
        self.max_frame = size;
        self
    }

    /// Feed bytes into the codec
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet part of a complete frame
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame, if any
    pub fn decode(&mut self) -> Option<MetadataFrame> {
        loop {
            let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') else {
                if !self.discarding && self.buffer.len() > self.max_frame {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    return Some(MetadataFrame::Malformed(SoundDriftError::MalformedFrame {
                        message: format!("frame exceeds {} bytes ({size} buffered)", self.max_frame),
                    }));
                }
                if self.discarding {
                    self.buffer.clear();
                }
                return None;
            };

            let line = self.buffer.split_to(newline + 1);
            if self.discarding {
                // Tail of an overlong frame that was already reported
                self.discarding = false;
                continue;
            }

            let frame = &line[..newline];
            return Some(match serde_json::from_slice(frame) {
                Ok(value) => MetadataFrame::Message(MetadataMessage::new(value)),
                Err(e) => MetadataFrame::Malformed(SoundDriftError::MalformedFrame {
                    message: e.to_string(),
                }),
            });
        }
    }
}

impl Default for MetadataCodec {
    fn default() -> Self {
        Self::new()
    }
}
