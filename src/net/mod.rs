//! Socket construction helpers
//!
//! All sockets are created with `socket2` so options can be set before
//! `bind`, then handed to tokio.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;


fn udp_socket(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Bind a UDP socket with `SO_REUSEADDR`
///
/// Used for the media socket so a quick reconnect can take the port back
/// while the previous socket is still lingering.
///
/// # Errors
///
/// Returns the OS error if the socket cannot be created or bound.
pub fn bind_reusable_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = udp_socket(addr)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Bind a UDP socket that may send to broadcast addresses
///
/// # Errors
///
/// Returns the OS error if the socket cannot be created or bound.
pub fn bind_broadcast_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = udp_socket(addr)?;
    socket.set_broadcast(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
