//! Server-string parsing and host+service resolution.
//!
//! Grammar: `host` | `host:port` | `host:service_name` (default port
//! "123"). Resolution is two independent steps, mirroring what the
//! teacher's own `async.rs` does with `tokio::net::lookup_host`: first
//! translate a service name to a numeric port (an OS database lookup,
//! `getservbyname`, which has no async equivalent and so runs on the
//! blocking pool), then resolve `host:port` to a list of socket
//! addresses via the system resolver.

use std::ffi::CString;
use std::net::SocketAddr;

use crate::error::{Error, Result};

const DEFAULT_PORT: &str = "123";

/// A server string split into its host and port-or-service parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServerString {
    pub(crate) host: String,
    pub(crate) port_or_service: String,
}

impl ServerString {
    /// Splits `spec` on the first `':'`. Absent ⇒ the default port.
    pub(crate) fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((host, rest)) => ServerString {
                host: host.to_string(),
                port_or_service: rest.to_string(),
            },
            None => ServerString {
                host: spec.to_string(),
                port_or_service: DEFAULT_PORT.to_string(),
            },
        }
    }
}

/// Resolves a server string into an ordered, non-empty list of socket
/// addresses, or [`Error::Resolve`].
pub(crate) async fn resolve(spec: &str) -> Result<Vec<SocketAddr>> {
    let server = ServerString::parse(spec);
    let port = resolve_port(&server.port_or_service).await?;
    let authority = format!("{}:{port}", server.host);

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(authority)
        .await
        .map_err(|_| Error::Resolve)?
        .collect();

    if addrs.is_empty() {
        return Err(Error::Resolve);
    }

    Ok(addrs)
}

/// Resolves `port_or_service` to a numeric port. A string that parses
/// as `u16` is used directly; otherwise it is looked up as a service
/// name in the system name/service database (`/etc/services` and
/// friends) via `getservbyname`, which has no portable async
/// counterpart and so is dispatched to the blocking pool.
async fn resolve_port(port_or_service: &str) -> Result<u16> {
    if let Ok(port) = port_or_service.parse::<u16>() {
        return Ok(port);
    }

    let service = port_or_service.to_string();
    tokio::task::spawn_blocking(move || lookup_service_port(&service))
        .await
        .map_err(|_| Error::Resolve)?
}

fn lookup_service_port(service: &str) -> Result<u16> {
    let c_service = CString::new(service).map_err(|_| Error::Resolve)?;
    let c_proto = CString::new("udp").map_err(|_| Error::Resolve)?;

    // SAFETY: both arguments are valid, nul-terminated C strings kept
    // alive for the duration of the call; `getservbyname` returns a
    // pointer into thread-local/static storage that we only read
    // before returning.
    let entry = unsafe { libc::getservbyname(c_service.as_ptr(), c_proto.as_ptr()) };

    if entry.is_null() {
        return Err(Error::Resolve);
    }

    // SAFETY: `entry` was just checked non-null and was produced by
    // `getservbyname`, which guarantees `s_port` is populated.
    let net_order_port = unsafe { (*entry).s_port };
    Ok(u16::from_be(net_order_port as u16))
}
