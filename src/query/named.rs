//! Host-string → resolver → [`series`] pipeline, presenting the
//! unified [`Status`] taxonomy external callers see.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::{Error, Status};
use crate::packet::Packet;
use crate::query::single::SingleResult;
use crate::query::{series, Cancel};
use crate::resolver;

#[cfg(feature = "log")]
use log::debug;

/// Default overall timeout (§4.6): 5000 ms.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// `(name, resolved_address, status, packet, rtt)` — delivered
/// exactly once per query, to the callback given to
/// [`crate::client::Client::query`].
#[derive(Debug, Clone)]
pub struct NamedOutcome {
    pub name: String,
    pub resolved_address: String,
    pub status: Status,
    pub packet: Packet,
    pub rtt: Duration,
}

/// A weak handle to an in-flight named query, held by
/// [`crate::client::Client`]'s registry so that `cancel()` can reach
/// it without keeping it alive.
#[derive(Clone)]
pub(crate) struct Handle {
    cancel: Weak<Cancel>,
}

impl Handle {
    /// Requests cancellation. A no-op if the query has already
    /// finalized and dropped its last strong reference.
    pub(crate) fn cancel(&self) {
        if let Some(cancel) = self.cancel.upgrade() {
            cancel.cancel();
        }
    }

    /// Whether the query this handle refers to is still in flight.
    pub(crate) fn is_alive(&self) -> bool {
        self.cancel.upgrade().is_some()
    }
}

/// Spawns a NamedQuery onto `rt`, running `callback` exactly once when
/// it finishes. Returns a weak [`Handle`] for the Client registry.
///
/// The spawned task itself holds the only strong [`Arc<Cancel>`]; when
/// the task ends, the handle's weak reference simply stops upgrading
/// — the "owned jointly by its own posted handlers" model from the
/// design notes, realized as one `tokio::task` instead of a
/// hand-rolled reference cycle.
pub(crate) fn spawn<F>(rt: &tokio::runtime::Handle, server: String, timeout: Duration, callback: F) -> Handle
where
    F: FnOnce(NamedOutcome) + Send + 'static,
{
    let cancel = Arc::new(Cancel::new());
    let weak = Arc::downgrade(&cancel);

    rt.spawn(async move {
        let outcome = execute(&server, timeout, &cancel).await;

        #[cfg(feature = "log")]
        debug!(
            target: "tempus::query::named",
            "finalized {} -> {:?} (addr={:?}, rtt={:?})",
            outcome.name, outcome.status, outcome.resolved_address, outcome.rtt,
        );

        callback(outcome);
    });

    Handle { cancel: weak }
}

async fn execute(server: &str, timeout: Duration, cancel: &Cancel) -> NamedOutcome {
    #[cfg(feature = "log")]
    debug!(target: "tempus::query::named", "starting named query for {server}, timeout={timeout:?}");

    tokio::select! {
        biased;

        () = cancel.cancelled() => synthetic(server, Status::Cancelled),

        () = tokio::time::sleep(timeout) => synthetic(server, Status::TimeoutError),

        outcome = resolve_and_query(server, cancel) => outcome,
    }
}

fn synthetic(server: &str, status: Status) -> NamedOutcome {
    NamedOutcome {
        name: server.to_string(),
        resolved_address: String::new(),
        status,
        packet: Packet::null(),
        rtt: Duration::ZERO,
    }
}

async fn resolve_and_query(server: &str, cancel: &Cancel) -> NamedOutcome {
    let addrs: Vec<SocketAddr> = match resolver::resolve(server).await {
        Ok(addrs) => addrs,
        Err(_err) => {
            #[cfg(feature = "log")]
            debug!(target: "tempus::query::named", "resolve failed for {server}: {_err}");

            return synthetic(server, Status::ResolveError);
        }
    };

    let outcome = series::run(&addrs, series::DEFAULT_TIMEOUT, cancel).await;
    let resolved_address = format!("{}:{}", outcome.endpoint.ip(), outcome.endpoint.port());

    let status = match outcome.result {
        SingleResult::Ok => Status::Succeeded,
        SingleResult::Aborted => Status::Cancelled,
        SingleResult::TimedOut => Status::TimeoutError,
        SingleResult::MessageSize => Status::ReceiveError,
        SingleResult::Error(Error::Send) => Status::SendError,
        SingleResult::Error(_) => Status::ReceiveError,
    };

    NamedOutcome {
        name: server.to_string(),
        resolved_address,
        status,
        packet: outcome.packet,
        rtt: outcome.rtt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_SIZE;
    use std::sync::Mutex;
    use tokio::net::UdpSocket;

    fn collecting_callback() -> (Arc<Mutex<Vec<NamedOutcome>>>, impl FnOnce(NamedOutcome) + Send + 'static) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let for_cb = Arc::clone(&results);
        (results, move |outcome| for_cb.lock().unwrap().push(outcome))
    }

    #[tokio::test]
    async fn nonexistent_host_yields_resolve_error() {
        let rt = tokio::runtime::Handle::current();
        let (results, cb) = collecting_callback();

        spawn(&rt, "nonexistent.invalid".to_string(), DEFAULT_TIMEOUT, cb);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::ResolveError);
        assert_eq!(results[0].resolved_address, "");
    }

    #[tokio::test(start_paused = true)]
    async fn loopback_echo_server_succeeds() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; PACKET_SIZE];
            if let Ok((n, from)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&buf[..n], from).await;
            }
        });

        let rt = tokio::runtime::Handle::current();
        let (results, cb) = collecting_callback();

        spawn(&rt, addr.to_string(), DEFAULT_TIMEOUT, cb);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Succeeded);
        assert_eq!(results[0].resolved_address, addr.to_string());
        assert!(!results[0].packet.is_null());
    }

    #[tokio::test]
    async fn cancel_before_resolve_completes_yields_cancelled() {
        let rt = tokio::runtime::Handle::current();
        let (results, cb) = collecting_callback();

        let handle = spawn(&rt, "127.0.0.1:9".to_string(), Duration::from_secs(30), cb);
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Cancelled);
    }

    /// Live-network test against the public NTP pool; not run by
    /// default.
    #[tokio::test]
    #[ignore = "requires outbound UDP/123 and a reachable NTP server"]
    async fn real_pool_server_succeeds() {
        let rt = tokio::runtime::Handle::current();
        let (results, cb) = collecting_callback();

        spawn(&rt, "pool.ntp.org".to_string(), DEFAULT_TIMEOUT, cb);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Succeeded);
        assert!(results[0].rtt < Duration::from_secs(1));
    }
}
