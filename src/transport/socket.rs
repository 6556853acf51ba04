//! Async UDP socket wrapper for TFTP transfers.
//!
//! Provides a small interface over tokio's `UdpSocket` with an owned
//! receive buffer sized for the largest negotiable data block.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::core::MAX_BLOCK_SIZE;

/// Receive buffer size: the largest data packet plus its 4-byte header.
pub const RECV_BUFFER_SIZE: usize = MAX_BLOCK_SIZE + 4;

/// Async UDP socket for one or more TFTP exchanges.
#[derive(Debug)]
pub struct TftpSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Receive buffer.
    recv_buffer: Vec<u8>,
}

impl TftpSocket {
    /// Bind to the given address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket))
    }

    /// Bind an ephemeral socket suitable for talking to `peer`.
    ///
    /// Each transfer runs on its own ephemeral port: the port is the
    /// transfer identifier on the wire, so sessions must not share one.
    pub async fn ephemeral_for(peer: SocketAddr) -> io::Result<Self> {
        let bind_addr: SocketAddr = match peer {
            SocketAddr::V4(_) => (IpAddr::from([0u8, 0, 0, 0]), 0).into(),
            SocketAddr::V6(_) => (IpAddr::from([0u16; 8]), 0).into(),
        };
        Self::bind(bind_addr).await
    }

    /// Wrap an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send one datagram to a specific address. Fire-and-forget: no
    /// delivery or ordering guarantee.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Receive one datagram and the sender's address.
    pub async fn recv_from(&mut self) -> io::Result<(&[u8], SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Get a clone of the Arc-wrapped socket.
    pub fn socket_arc(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_socket_bind() {
        let socket = TftpSocket::bind(localhost()).await.unwrap();
        assert!(socket.local_addr().unwrap().port() != 0);
    }

    #[tokio::test]
    async fn test_socket_send_recv() {
        let mut server = TftpSocket::bind(localhost()).await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = TftpSocket::bind(localhost()).await.unwrap();
        let client_addr = client.local_addr().unwrap();

        client.send_to(b"\x00\x04\x00\x01", server_addr).await.unwrap();

        let (received, from) = server.recv_from().await.unwrap();
        assert_eq!(received, b"\x00\x04\x00\x01");
        assert_eq!(from, client_addr);
    }

    #[tokio::test]
    async fn test_ephemeral_matches_family() {
        let peer: SocketAddr = "192.0.2.1:69".parse().unwrap();
        let socket = TftpSocket::ephemeral_for(peer).await.unwrap();
        assert!(socket.local_addr().unwrap().is_ipv4());
    }
}
