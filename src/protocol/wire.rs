//! Literal datagrams of the media and discovery sockets

use crate::error::SoundDriftError;
use crate::types::DeviceInfo;

/// Prefix of the media handshake datagram
pub const HANDSHAKE_MARKER: &str = "SoundDriftConnectionRequest|";

/// Best-effort media datagram announcing the client is leaving
pub const DISCONNECT_MARKER: &[u8] = b"SoundDriftDisconnect";

/// Broadcast discovery probe
pub const DISCOVERY_PROBE: &[u8] = b"SoundDriftDiscovery";

/// Build the handshake datagram: the marker immediately followed by the device JSON
///
/// # Errors
///
/// Returns an error if the device info cannot be serialized.
pub fn handshake_datagram(device: &DeviceInfo) -> Result<Vec<u8>, SoundDriftError> {
    let json = serde_json::to_string(device)?;
    let mut datagram = Vec::with_capacity(HANDSHAKE_MARKER.len() + json.len());
    datagram.extend_from_slice(HANDSHAKE_MARKER.as_bytes());
    datagram.extend_from_slice(json.as_bytes());
    Ok(datagram)
}

/// Extract the announced device name from a discovery reply
///
/// The payload must be UTF-8 text forming a JSON object whose `deviceName`
/// is a non-empty string. Anything else is stray traffic.
///
/// # Errors
///
/// Returns `MalformedDiscoveryPayload` describing why the payload was rejected.
pub fn parse_announcement(payload: &[u8]) -> Result<String, SoundDriftError> {
    let malformed = |message: &str| SoundDriftError::MalformedDiscoveryPayload {
        message: message.to_string(),
    };

    let text = std::str::from_utf8(payload).map_err(|_| malformed("not UTF-8"))?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| malformed(&e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("not a JSON object"))?;

    match object.get("deviceName").and_then(serde_json::Value::as_str) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(malformed("missing deviceName")),
    }
}
