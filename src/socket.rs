//! UDP socket abstraction used by [`crate::query::SingleQuery`].
//!
//! Binds an ephemeral IPv4 port, exchanges exactly one request/response
//! datagram per query, and can be dropped to abort any I/O in flight —
//! closing a tokio `UdpSocket` wakes a pending `recv_from` with an
//! error, which is exactly the cancellation primitive §4.4 relies on.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::packet::PACKET_SIZE;

/// Size of the receive buffer: one byte larger than a well-formed
/// packet, so that a datagram longer than [`PACKET_SIZE`] is reported
/// with `n > PACKET_SIZE` instead of being silently truncated to
/// exactly 48 bytes and mistaken for a valid reply (spec.md §7's
/// "receive of a packet longer than 48 bytes silently accepted" is a
/// fatal invariant, not an acceptable outcome).
pub(crate) const RECV_BUF_SIZE: usize = PACKET_SIZE + 1;

/// A bound UDP socket ready to talk to one peer at a time.
pub(crate) struct Socket {
    inner: UdpSocket,
}

impl Socket {
    /// Binds an ephemeral port on the wildcard IPv4 address.
    pub(crate) async fn bind() -> io::Result<Self> {
        let inner = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Socket { inner })
    }

    /// Sends a 48-byte request datagram to `peer`.
    pub(crate) async fn send_to(&self, buf: &[u8; PACKET_SIZE], peer: SocketAddr) -> io::Result<()> {
        let n = self.inner.send_to(buf, peer).await?;
        if n != PACKET_SIZE {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short send"));
        }
        Ok(())
    }

    /// Receives one datagram, returning its byte count and sender.
    ///
    /// `buf` must be [`RECV_BUF_SIZE`] bytes, one more than a
    /// well-formed packet: a reply exactly 48 bytes long fills `buf[..48]`
    /// and leaves `n == 48`, while anything longer reports `n >
    /// PACKET_SIZE` instead of being truncated down to a deceptive
    /// `n == 48`. The caller (see [`crate::query::single`]) rejects any
    /// `n != PACKET_SIZE` as `message_size`.
    pub(crate) async fn recv_from(&self, buf: &mut [u8; RECV_BUF_SIZE]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}
