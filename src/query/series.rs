//! Sequential fan-out over a resolved endpoint list.

use std::net::SocketAddr;
use std::time::Duration;

use crate::query::single::{self, SingleOutcome, SingleResult};
use crate::query::Cancel;

#[cfg(feature = "log")]
use log::debug;

/// Default overall timeout (§4.5): 5000 ms. Strictly exceeds
/// [`crate::query::single::DEFAULT_TIMEOUT`] so that an outer timeout
/// can still interrupt a fail-over already in progress (§9).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tries each endpoint in order until one succeeds or the list is
/// exhausted, bounded by `timeout` and `cancel`.
///
/// `endpoints` must be non-empty; callers that resolved an empty list
/// should not call this at all (§4.5's "constructor returns no
/// handle").
pub(crate) async fn run(endpoints: &[SocketAddr], timeout: Duration, cancel: &Cancel) -> SingleOutcome {
    debug_assert!(!endpoints.is_empty());

    tokio::select! {
        biased;

        () = cancel.cancelled() => SingleOutcome {
            endpoint: endpoints[0],
            result: SingleResult::Aborted,
            packet: crate::packet::Packet::null(),
            rtt: Duration::ZERO,
        },

        () = tokio::time::sleep(timeout) => SingleOutcome {
            endpoint: *endpoints.last().unwrap(),
            result: SingleResult::TimedOut,
            packet: crate::packet::Packet::null(),
            rtt: Duration::ZERO,
        },

        outcome = fan_out(endpoints, cancel) => outcome,
    }
}

async fn fan_out(endpoints: &[SocketAddr], cancel: &Cancel) -> SingleOutcome {
    let last_index = endpoints.len() - 1;

    for (i, &endpoint) in endpoints.iter().enumerate() {
        let outcome = single::run(endpoint, single::DEFAULT_TIMEOUT, cancel).await;

        let recoverable = !matches!(outcome.result, SingleResult::Ok | SingleResult::Aborted);

        if recoverable && i < last_index {
            #[cfg(feature = "log")]
            debug!(
                target: "tempus::query::series",
                "endpoint {} failed ({:?}), failing over to {}",
                endpoint, outcome.result, endpoints[i + 1],
            );
            continue;
        }

        return outcome;
    }

    unreachable!("endpoints is non-empty, loop always returns on its last iteration")
}
