//! UDP transport layer for Venus communication.
//!
//! This module provides the [`Transport`] trait, the seam between the retry
//! engine and the network, and [`UdpTransport`], its UDP implementation. The
//! transport only knows about sockets and bytes; it never looks inside a
//! datagram.
//!
//! # Design
//!
//! - **One-shot sockets** - every exchange binds a fresh ephemeral port,
//!   sends one datagram, waits for one reply and closes the socket. The device
//!   answers whichever port last wrote to it, so a fresh socket can never pick
//!   up a late reply to an earlier attempt, and several clients on one host
//!   never compete for a fixed local port.
//! - **Off the async path** - the blocking receive runs on tokio's blocking
//!   pool; the caller only awaits its completion.
//! - **Bounded** - the receive is limited by the per-attempt timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use venus_udp::{Transport, UdpTransport};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let transport = UdpTransport::new("192.168.1.50", 30000);
//! let reply = transport
//!     .exchange(br#"{"id":1,"method":"ES.GetMode","params":{"id":0}}"#, Duration::from_secs(2))
//!     .await?;
//! println!("{}", String::from_utf8_lossy(&reply));
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{Result, VenusError};

/// Default UDP port of the device's local API.
pub const DEFAULT_PORT: u16 = 30000;

/// Largest datagram accepted from the device.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Sends one request datagram and waits for one reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `payload` and returns the first reply received within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `VenusError::Timeout` if nothing arrives in time and
    /// `VenusError::Io` for socket failures.
    async fn exchange(&self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>>;
}

/// UDP transport to one device.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    host: String,
    port: u16,
}

impl UdpTransport {
    /// Creates a transport for the device at `host:port`.
    ///
    /// No socket is opened until the first exchange.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Device host name or IP address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Device port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(&self, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let host = self.host.clone();
        let port = self.port;
        let payload = payload.to_vec();

        tokio::task::spawn_blocking(move || exchange_blocking(&host, port, &payload, timeout))
            .await
            .map_err(|e| VenusError::Io(io::Error::other(e.to_string())))?
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            VenusError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no IPv4 address for {host}"),
            ))
        })
}

/// Performs one exchange on a fresh socket. The socket is dropped on return.
fn exchange_blocking(host: &str, port: u16, payload: &[u8], timeout: Duration) -> Result<Vec<u8>> {
    let peer = resolve(host, port)?;
    let deadline = Instant::now() + timeout;

    // Bind to any available local port
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_write_timeout(Some(timeout))?;

    tracing::trace!(%peer, local = ?socket.local_addr().ok(), bytes = payload.len(), "sending datagram");
    socket.send_to(payload, peer)?;

    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(VenusError::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        match socket.recv_from(&mut buffer) {
            Ok((size, from)) if from.ip() == peer.ip() => {
                buffer.truncate(size);
                tracing::trace!(%from, bytes = size, "received datagram");
                return Ok(buffer);
            }
            Ok((_, from)) => {
                tracing::debug!(%from, %peer, "discarding datagram from unexpected host");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(VenusError::Timeout),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(VenusError::Timeout),
            Err(e) => return Err(VenusError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_PORT, 30000);
        assert_eq!(MAX_DATAGRAM_SIZE, 65535);
    }

    #[test]
    fn test_transport_accessors() {
        let transport = UdpTransport::new("192.168.1.50", 30001);
        assert_eq!(transport.host(), "192.168.1.50");
        assert_eq!(transport.port(), 30001);
    }

    #[test]
    fn test_resolve_literal_address() {
        let addr = resolve("127.0.0.1", 30000).unwrap();
        assert_eq!(addr, "127.0.0.1:30000".parse().unwrap());
    }

    #[tokio::test]
    async fn test_exchange_with_local_echo() {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = device.local_addr().unwrap().port();
        let echo = std::thread::spawn(move || {
            let mut buf = [0u8; 512];
            let (n, from) = device.recv_from(&mut buf).unwrap();
            device.send_to(&buf[..n], from).unwrap();
            from
        });

        let transport = UdpTransport::new("127.0.0.1", port);
        let reply = transport
            .exchange(b"{\"id\":1}", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(reply, b"{\"id\":1}");

        let client_addr = echo.join().unwrap();
        assert_ne!(client_addr.port(), port);
    }

    #[tokio::test]
    async fn test_exchange_times_out_without_reply() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = silent.local_addr().unwrap().port();

        let transport = UdpTransport::new("127.0.0.1", port);
        let err = transport
            .exchange(b"ping", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, VenusError::Timeout));
        drop(silent);
    }

    #[tokio::test]
    async fn test_repeated_exchanges_send_from_ephemeral_ports() {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = device.local_addr().unwrap().port();
        let echo = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let mut senders = Vec::new();
            for _ in 0..2 {
                let (n, from) = device.recv_from(&mut buf).unwrap();
                device.send_to(&buf[..n], from).unwrap();
                senders.push(from);
            }
            senders
        });

        let transport = UdpTransport::new("127.0.0.1", port);
        for _ in 0..2 {
            transport.exchange(b"x", Duration::from_secs(2)).await.unwrap();
        }

        let senders = echo.join().unwrap();
        assert_eq!(senders.len(), 2);
        assert!(senders.iter().all(|s| s.port() != port));
    }
}
