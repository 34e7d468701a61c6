use std::io;
use std::time::Duration;
use thiserror::Error;

/// Which half of a session a transport error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// UDP media socket
    Media,
    /// TCP metadata connection
    Metadata,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Media => write!(f, "media"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

/// Errors that can occur during SoundDrift operations
#[derive(Debug, Error)]
pub enum SoundDriftError {
    // ===== Transport Errors =====
    /// Media socket could not be bound, or the handshake could not be sent
    #[error("transport bind failure: {message}")]
    TransportBind {
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<io::Error>,
    },

    /// Remote end closed the channel, or a local close completed
    #[error("{channel} channel closed")]
    TransportClosed {
        /// The channel that closed
        channel: Channel,
    },

    /// Failed to establish the metadata connection
    #[error("connection failed to {address}: {message}")]
    ConnectionFailed {
        /// The server address
        address: String,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<io::Error>,
    },

    /// Metadata connection attempt timed out
    #[error("connection timeout after {duration:?}")]
    ConnectionTimeout {
        /// The duration of the timeout
        duration: Duration,
    },

    /// No media traffic arrived within the liveness window
    #[error("no media traffic for {elapsed:?}")]
    LivenessTimeout {
        /// Time since the last datagram
        elapsed: Duration,
    },

    // ===== Per-unit Errors =====
    /// A metadata frame was not valid JSON
    #[error("malformed metadata frame: {message}")]
    MalformedFrame {
        /// Description of the error
        message: String,
    },

    /// A discovery reply was not a JSON object carrying a device name
    #[error("malformed discovery payload: {message}")]
    MalformedDiscoveryPayload {
        /// Description of the error
        message: String,
    },

    /// The playback device rejected a write
    #[error("sink write failure: {message}")]
    SinkWrite {
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    /// A pending connect was abandoned because disconnect was requested
    #[error("connect to {address} cancelled")]
    ConnectCancelled {
        /// The server that was being connected
        address: String,
    },

    /// Invalid parameter provided
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: String,
        /// Description of the error
        message: String,
    },

    // ===== I/O Errors =====
    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] io::Error),

    /// JSON encoding/decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SoundDriftError {
    /// Check if this error is dropped locally without affecting the session
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::MalformedDiscoveryPayload { .. }
                | Self::SinkWrite { .. }
        )
    }

    /// Check if this error tears the whole session down
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportBind { .. }
                | Self::TransportClosed { .. }
                | Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::LivenessTimeout { .. }
                | Self::Network(_)
        )
    }

    pub(crate) fn bind(message: impl Into<String>, source: io::Error) -> Self {
        Self::TransportBind {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type alias for SoundDrift operations
pub type Result<T> = std::result::Result<T, SoundDriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SoundDriftError::TransportClosed {
            channel: Channel::Metadata,
        };
        assert_eq!(err.to_string(), "metadata channel closed");

        let err = SoundDriftError::LivenessTimeout {
            elapsed: Duration::from_secs(6),
        };
        assert_eq!(err.to_string(), "no media traffic for 6s");
    }

    #[test]
    fn test_error_is_recoverable() {
        let frame = SoundDriftError::MalformedFrame {
            message: "expected value".to_string(),
        };
        assert!(frame.is_recoverable());
        assert!(!frame.is_session_fatal());

        let sink = SoundDriftError::SinkWrite {
            message: "device gone".to_string(),
        };
        assert!(sink.is_recoverable());
    }

    #[test]
    fn test_error_is_session_fatal() {
        let err = SoundDriftError::bind(
            "handshake send failed",
            io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(err.is_session_fatal());
        assert!(!err.is_recoverable());

        let timeout = SoundDriftError::LivenessTimeout {
            elapsed: Duration::from_secs(5),
        };
        assert!(timeout.is_session_fatal());
    }

    #[test]
    fn test_error_transport_closed_is_fatal() {
        let err = SoundDriftError::TransportClosed {
            channel: Channel::Media,
        };
        assert!(err.is_session_fatal());
        assert!(!err.is_recoverable());

        let cancelled = SoundDriftError::ConnectCancelled {
            address: "10.0.0.2".to_string(),
        };
        assert!(!cancelled.is_session_fatal());
        assert_eq!(cancelled.to_string(), "connect to 10.0.0.2 cancelled");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err: SoundDriftError = io_err.into();

        assert!(matches!(err, SoundDriftError::Network(_)));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SoundDriftError>();
    }
}
