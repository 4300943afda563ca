//! UDP socket construction

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::constants::{RECV_POLL_TIMEOUT, SOCKET_RECV_BUFFER};
use crate::error::SocketError;

/// Unbound-port socket for outbound datagrams.
pub fn send_socket() -> Result<UdpSocket, SocketError> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(|e| SocketError::Bind(e.to_string()))
}

/// Socket bound to `port` on all interfaces, ready for the listener loop.
///
/// The kernel receive buffer is enlarged so a briefly stalled listener
/// thread loses less, and a read timeout bounds every blocking receive so
/// cancellation is observed within one poll interval.
pub fn listen_socket(port: u16) -> Result<UdpSocket, SocketError> {
    let bind = |e: std::io::Error| SocketError::Bind(e.to_string());

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind)?;
    socket.set_recv_buffer_size(SOCKET_RECV_BUFFER).map_err(bind)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(bind)?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(RECV_POLL_TIMEOUT)).map_err(bind)?;
    Ok(socket)
}
