//! Error and status taxonomies used across the crate.
//!
//! The transport/codec layer reports a flat [`Error`] the way the
//! original SNTP client does: a `#[non_exhaustive]` enum, no
//! `anyhow`/`thiserror`, compared and matched directly. The NTP query
//! layer (SingleQuery/SeriesQuery/NamedQuery) reports the coarser
//! [`Status`] taxonomy from the external interface, whose discriminants
//! are powers of two so callers can OR several together in an observer.

use core::fmt;

/// The error type for the SNTP wire layer.
///
/// Errors originate either on the network layer or while validating a
/// response packet.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The underlying UDP `send_to` failed.
    Send,
    /// The underlying UDP `recv_from` failed.
    Receive,
    /// A server address could not be resolved.
    Resolve,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Send => "failed to send the request datagram",
            Error::Receive => "failed to receive the response datagram",
            Error::Resolve => "failed to resolve the server address",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

/// The result type used throughout the transport layer.
pub type Result<T> = core::result::Result<T, Error>;

/// Terminal status of a [`crate::query::NamedQuery`], reported exactly
/// once per query.
///
/// Discriminants are powers of two so an observer can accumulate a
/// bitmask of statuses seen across many queries.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Status {
    /// The server name could not be resolved.
    ResolveError = 1,
    /// Sending the request datagram failed.
    SendError = 2,
    /// Receiving the response datagram failed.
    ReceiveError = 4,
    /// The query's overall timeout elapsed.
    TimeoutError = 8,
    /// The query was cancelled.
    Cancelled = 16,
    /// The query completed successfully.
    Succeeded = 32,
}

impl Status {
    /// The numeric, externally stable encoding of this status.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Status::ResolveError => "resolve error",
            Status::SendError => "send error",
            Status::ReceiveError => "receive error",
            Status::TimeoutError => "timeout",
            Status::Cancelled => "cancelled",
            Status::Succeeded => "succeeded",
        };
        f.write_str(msg)
    }
}
