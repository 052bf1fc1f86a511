//! Demonstrates making a handful of concurrent NTP requests through
//! [`tempus::Client`] and printing the resolved offset of each.
use std::sync::mpsc;
use std::time::Duration;

use tempus::{Client, Status};

const POOL_NTP_ADDR: &str = "pool.ntp.org:123";
const GOOGLE_NTP_ADDR: &str = "time.google.com:123";

fn main() {
    #[cfg(feature = "log")]
    if cfg!(debug_assertions) {
        simple_logger::init_with_level(log::Level::Debug).unwrap();
    } else {
        simple_logger::init_with_level(log::Level::Info).unwrap();
    }

    let (tx, rx) = mpsc::channel();
    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .expect("failed to start the worker pool");

    for server in [POOL_NTP_ADDR, GOOGLE_NTP_ADDR] {
        client.query(server, None);
    }

    for _ in 0..2 {
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok(outcome) => match outcome.status {
                Status::Succeeded => {
                    let offset = outcome.packet.offset_at(std::time::SystemTime::now());
                    println!(
                        "{} ({}): offset={offset:?} rtt={:?}",
                        outcome.name, outcome.resolved_address, outcome.rtt
                    );
                }
                status => println!("{}: {status}", outcome.name),
            },
            Err(_) => println!("timed out waiting for a query result"),
        }
    }
}
