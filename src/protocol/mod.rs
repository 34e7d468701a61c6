//! SoundDrift wire protocol
//!
//! Fixed ports, the literal datagrams exchanged on the media and discovery
//! sockets, and the sans-IO framing of the metadata stream.

pub mod metadata_codec;
pub mod wire;


pub use metadata_codec::{MetadataCodec, MetadataFrame};
pub use wire::{
    DISCONNECT_MARKER, DISCOVERY_PROBE, HANDSHAKE_MARKER, handshake_datagram, parse_announcement,
};

/// Well-known ports
pub mod ports {
    /// Local UDP port the client media socket binds to
    pub const MEDIA_CLIENT: u16 = 55555;
    /// Server UDP port receiving handshake and disconnect datagrams
    pub const MEDIA_SERVER: u16 = 55556;
    /// Server TCP port carrying metadata frames
    pub const METADATA: u16 = 55557;
    /// Port servers listen on for discovery probes
    pub const DISCOVERY: u16 = 55558;
}
