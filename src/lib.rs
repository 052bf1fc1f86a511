//! Calendrical value types and an asynchronous NTPv4 client
//!
//! # Overview
//!
//! This crate provides two things that turn out to be the same problem
//! at different altitudes:
//!
//! - [`calendar`]: a proleptic-Gregorian, nanosecond-resolution
//!   calendar value (`DateTime`) with Julian Day conversion and a
//!   `strftime`-adjacent formatting/parsing grammar.
//! - an asynchronous NTPv4 client, built bottom-up from a wire [`codec`],
//!   an era-aware [`timestamp`] type, an immutable [`packet`], and three
//!   layers of query ([`query::single`], [`query::series`],
//!   [`query::named`]) composed behind the [`client::Client`] facade.
//!
//! The calendar type exists to give NTP results something to print; the
//! hard engineering is the NTP subsystem.
//!
//! # Usage
//!
//! Put this in your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! tempus = "0.1"
//! ```
//!
//! ## Features
//!
//! - `std`: includes functionality that depends on the standard library
//! - `log`: enables library debug output during execution
//!
//! ## Logging support
//!
//! Library debug logs can be enabled in executables by enabling the
//! `log` feature. Packet construction, send/receive, fail-over
//! transitions, timer firing, cancellation and finalization are logged
//! at `debug` level; transport failures at `error` level.
//!
//! # Example
//!
//! ```no_run
//! use tempus::client::Client;
//!
//! let client = Client::new(|outcome| {
//!     println!("{}: {:?} rtt={:?}", outcome.name, outcome.status, outcome.rtt);
//! })
//! .expect("failed to start the worker pool");
//!
//! client.query("pool.ntp.org", None);
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! ```

pub mod calendar;
pub mod client;
pub mod codec;
pub mod error;
pub mod packet;
pub mod query;
pub(crate) mod resolver;
pub(crate) mod socket;
pub mod timestamp;

pub use client::Client;
pub use error::{Error, Status};
pub use packet::{Packet, PacketFields};
pub use query::named::NamedOutcome;
pub use timestamp::NtpTimestamp;
