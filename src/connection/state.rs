//! Session state and events

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::PipelineStats;
use crate::error::SoundDriftError;
use crate::metadata::{MetadataMessage, MetadataStats};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session
    Idle,
    /// Tearing down any previous session and opening both channels
    Connecting,
    /// Metadata and media channels both up
    Connected,
    /// Closing both channels
    Disconnecting,
}

impl SessionStatus {
    /// Check if fully connected
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, SessionStatus::Connected)
    }

    /// Check if a session exists or is being set up or torn down
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }
}

/// Session events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Status changed
    StatusChanged {
        /// The previous status
        old: SessionStatus,
        /// The new status
        new: SessionStatus,
        /// Whether metadata should be shown (true only while connected)
        show_metadata: bool,
    },
    /// Metadata frame from the server, forwarded only while connected
    Metadata(MetadataMessage),
    /// Session ended
    Disconnected {
        /// The server of the ended session
        server: IpAddr,
        /// The reason for disconnection
        reason: DisconnectReason,
    },
}

/// Reason for disconnection
#[derive(Debug, Clone)]
pub enum DisconnectReason {
    /// Caller requested disconnect, including during a pending connect
    UserRequested,
    /// A new connect replaced this session
    Replaced,
    /// A channel failed after the session was up
    Failed(Arc<SoundDriftError>),
    /// Session could not be established
    ConnectFailed(Arc<SoundDriftError>),
}

impl DisconnectReason {
    /// The error behind a failure-driven disconnect
    #[must_use]
    pub fn error(&self) -> Option<&SoundDriftError> {
        match self {
            Self::Failed(e) | Self::ConnectFailed(e) => Some(e),
            Self::UserRequested | Self::Replaced => None,
        }
    }

    /// Check if the caller asked for this disconnect
    #[must_use]
    pub fn is_requested(&self) -> bool {
        matches!(self, Self::UserRequested | Self::Replaced)
    }
}

/// Diagnostics of the current session
#[derive(Debug, Clone, Copy)]
pub struct SessionStats {
    /// When the session reached `Connected`
    pub connected_at: Instant,
    /// Media ingest statistics
    pub pipeline: PipelineStats,
    /// Metadata channel statistics
    pub metadata: MetadataStats,
}

impl SessionStats {
    /// Get session uptime
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
