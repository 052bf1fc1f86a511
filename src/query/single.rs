//! One request/response exchange against one UDP endpoint.
//!
//! The C++ design this is modeled on posts a timer and a receive onto
//! a shared reactor and distinguishes cancellation from timeout by
//! consulting a sentinel expiry value in the completion handler. A
//! `tokio::select!` over the receive, the timeout sleep, and a cancel
//! notification gets the same at-most-one-winner guarantee directly
//! from the runtime: whichever branch completes first *is* the
//! outcome, with no sentinel to consult afterward.

use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::error::Error;
use crate::packet::{Packet, PACKET_SIZE};
use crate::query::Cancel;
use crate::socket::{Socket, RECV_BUF_SIZE};
use crate::timestamp::NtpTimestamp;

#[cfg(feature = "log")]
use log::{debug, error};

/// Default per-endpoint timeout (§4.4): 3000 ms. Deliberately shorter
/// than [`crate::query::series::DEFAULT_TIMEOUT`] so an outer timeout
/// can still interrupt a fail-over in progress.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// The terminal outcome of one [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleResult {
    /// A well-formed 48-byte reply was received.
    Ok,
    /// `cancel` was notified before the exchange completed.
    Aborted,
    /// The per-endpoint timeout elapsed first.
    TimedOut,
    /// A reply arrived but was not exactly 48 bytes.
    MessageSize,
    /// The underlying transport failed to send or receive.
    Error(Error),
}

/// `(endpoint, result, packet, rtt)` — delivered exactly once per
/// query.
#[derive(Debug, Clone)]
pub struct SingleOutcome {
    pub endpoint: SocketAddr,
    pub result: SingleResult,
    pub packet: Packet,
    pub rtt: Duration,
}

/// Runs one query against `endpoint`, racing the exchange against
/// `timeout` and `cancel`.
pub(crate) async fn run(endpoint: SocketAddr, timeout: Duration, cancel: &Cancel) -> SingleOutcome {
    let transmit = NtpTimestamp::from_system_time(SystemTime::now());
    let request = Packet::request(transmit);
    let t_send = Instant::now();

    let socket = match Socket::bind().await {
        Ok(socket) => socket,
        Err(_err) => {
            #[cfg(feature = "log")]
            error!(target: "tempus::query::single", "failed to bind a UDP socket for {endpoint}: {_err}");

            return SingleOutcome {
                endpoint,
                result: SingleResult::Error(Error::Send),
                packet: request,
                rtt: t_send.elapsed(),
            }
        }
    };

    #[cfg(feature = "log")]
    debug!(target: "tempus::query::single", "sending request to {endpoint}, timeout={timeout:?}");

    tokio::select! {
        biased;

        () = cancel.cancelled() => {
            #[cfg(feature = "log")]
            debug!(target: "tempus::query::single", "cancelled while waiting on {endpoint}");

            SingleOutcome {
                endpoint,
                result: SingleResult::Aborted,
                packet: Packet::null(),
                rtt: t_send.elapsed(),
            }
        },

        () = tokio::time::sleep(timeout) => {
            #[cfg(feature = "log")]
            debug!(target: "tempus::query::single", "timed out waiting on {endpoint} after {timeout:?}");

            SingleOutcome {
                endpoint,
                result: SingleResult::TimedOut,
                packet: Packet::null(),
                rtt: t_send.elapsed(),
            }
        },

        outcome = exchange(&socket, endpoint, &request) => {
            let rtt = t_send.elapsed();

            #[cfg(feature = "log")]
            debug!(target: "tempus::query::single", "response from {endpoint} after {rtt:?}");

            match outcome {
                ExchangeOutcome::Ok(packet) => SingleOutcome { endpoint, result: SingleResult::Ok, packet, rtt },
                ExchangeOutcome::SendFailed => SingleOutcome {
                    endpoint,
                    result: SingleResult::Error(Error::Send),
                    packet: request,
                    rtt,
                },
                ExchangeOutcome::ReceiveFailed => SingleOutcome {
                    endpoint,
                    result: SingleResult::Error(Error::Receive),
                    packet: Packet::null(),
                    rtt,
                },
                ExchangeOutcome::WrongSize => SingleOutcome {
                    endpoint,
                    result: SingleResult::MessageSize,
                    packet: Packet::null(),
                    rtt,
                },
            }
        }
    }
}

enum ExchangeOutcome {
    Ok(Packet),
    SendFailed,
    ReceiveFailed,
    WrongSize,
}

async fn exchange(socket: &Socket, endpoint: SocketAddr, request: &Packet) -> ExchangeOutcome {
    if socket.send_to(&request.data(), endpoint).await.is_err() {
        return ExchangeOutcome::SendFailed;
    }

    let mut buf = [0u8; RECV_BUF_SIZE];
    let (n, _from) = match socket.recv_from(&mut buf).await {
        Ok(r) => r,
        Err(_) => return ExchangeOutcome::ReceiveFailed,
    };

    if n != PACKET_SIZE {
        return ExchangeOutcome::WrongSize;
    }

    let mut packet_bytes = [0u8; PACKET_SIZE];
    packet_bytes.copy_from_slice(&buf[..PACKET_SIZE]);
    ExchangeOutcome::Ok(Packet::from_bytes(packet_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::UdpSocket;

    async fn loopback_echo(reply_after: Duration) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; PACKET_SIZE];
            if let Ok((n, from)) = socket.recv_from(&mut buf).await {
                tokio::time::sleep(reply_after).await;
                let _ = socket.send_to(&buf[..n], from).await;
            }
        });

        addr
    }

    #[tokio::test(start_paused = true)]
    async fn success_against_echo_server() {
        let addr = loopback_echo(Duration::from_millis(100)).await;
        let cancel = Cancel::new();

        let outcome = run(addr, Duration::from_millis(400), &cancel).await;

        assert_eq!(outcome.result, SingleResult::Ok);
        assert!(!outcome.packet.is_null());
        assert!(outcome.rtt >= Duration::from_millis(100));
        assert!(outcome.rtt <= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_reply_is_rejected_not_truncated_into_a_valid_packet() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; PACKET_SIZE];
            if let Ok((_n, from)) = socket.recv_from(&mut buf).await {
                // One byte longer than a well-formed packet: must be
                // reported as message_size, never silently truncated
                // down to a deceptive 48-byte "success".
                let oversized = [0xAAu8; PACKET_SIZE + 1];
                let _ = socket.send_to(&oversized, from).await;
            }
        });
        let cancel = Cancel::new();

        let outcome = run(addr, Duration::from_millis(400), &cancel).await;

        assert_eq!(outcome.result, SingleResult::MessageSize);
        assert!(outcome.packet.is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_when_server_is_silent() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let cancel = Cancel::new();

        let outcome = run(addr, Duration::from_millis(200), &cancel).await;

        assert_eq!(outcome.result, SingleResult::TimedOut);
        assert!(outcome.packet.is_null());
    }

    #[tokio::test]
    async fn cancellation_while_receive_pending() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let cancel = Arc::new(Cancel::new());

        let cancel_for_task = Arc::clone(&cancel);
        let handle = tokio::spawn(async move {
            run(addr, Duration::from_secs(10), &cancel_for_task).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.result, SingleResult::Aborted);
        assert!(outcome.packet.is_null());
    }
}
