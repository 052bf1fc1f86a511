//! Cross-module properties (spec.md §8) driven against loopback UDP
//! servers through the public [`tempus::Client`] facade, rather than
//! any one layer's internals.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tempus::calendar::DateTime;
use tempus::{Client, Status};

const PACKET_SIZE: usize = 48;

fn spawn_loopback_echo(reply_after: Duration) -> SocketAddr {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();

    thread::spawn(move || {
        let mut buf = [0u8; PACKET_SIZE];
        if let Ok((n, from)) = socket.recv_from(&mut buf) {
            thread::sleep(reply_after);
            let _ = socket.send_to(&buf[..n], from);
        }
    });

    addr
}

#[test]
fn client_resolves_and_queries_a_numeric_loopback_endpoint() {
    let addr = spawn_loopback_echo(Duration::from_millis(20));
    let (tx, rx) = mpsc::channel();

    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();

    client.query(addr.to_string(), Some(Duration::from_secs(2)));

    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.status, Status::Succeeded);
    assert_eq!(outcome.resolved_address, addr.to_string());
    assert!(!outcome.packet.is_null());
    assert!(outcome.rtt >= Duration::from_millis(20));
}

#[test]
fn many_concurrent_queries_each_reach_their_own_distinct_server() {
    const N: usize = 6;
    let servers: Vec<SocketAddr> = (0..N)
        .map(|_| spawn_loopback_echo(Duration::from_millis(10)))
        .collect();

    let (tx, rx) = mpsc::channel();
    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();

    for server in &servers {
        client.query(server.to_string(), None);
    }

    let mut seen: Vec<String> = Vec::new();
    for _ in 0..N {
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.status, Status::Succeeded);
        seen.push(outcome.resolved_address);
    }

    let expected: Vec<String> = servers.iter().map(ToString::to_string).collect();
    seen.sort();
    let mut expected_sorted = expected.clone();
    expected_sorted.sort();
    assert_eq!(seen, expected_sorted);
}

#[test]
fn successful_outcome_formats_cleanly_through_the_calendar_module() {
    let addr = spawn_loopback_echo(Duration::from_millis(5));
    let (tx, rx) = mpsc::channel();

    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();

    client.query(addr.to_string(), None);
    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.status, Status::Succeeded);

    // The transmit timestamp on a freshly-built request packet, echoed
    // back by the loopback server, should format as a plausible
    // present-day UTC instant — this is the seam where the NTP layer
    // leans on the calendar module for presentation (spec.md §1, §6).
    let sent_at = DateTime::from_ntp_timestamp(outcome.packet.transmit_timestamp());
    let rendered = sent_at.format("yyyy-MM-dd hh:mm:ss");
    assert_eq!(rendered.len(), "2024-01-01 00:00:00".len());
    assert!(sent_at.year() >= 2024);
}

#[test]
fn nonexistent_host_is_surfaced_as_resolve_error() {
    let (tx, rx) = mpsc::channel();
    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();

    client.query("nonexistent.invalid", Some(Duration::from_secs(2)));

    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.status, Status::ResolveError);
    assert!(outcome.resolved_address.is_empty());
    assert!(outcome.packet.is_null());
    assert_eq!(outcome.rtt, Duration::ZERO);
}

#[test]
fn cancel_all_delivers_cancelled_and_subsequent_queries_are_unaffected() {
    let (tx, rx) = mpsc::channel();
    let client = Client::new(move |outcome| {
        let _ = tx.send(outcome);
    })
    .unwrap();

    // port 9 (discard) on loopback: nothing answers, so the query sits
    // waiting for cancel() to reach it.
    client.query("127.0.0.1:9", Some(Duration::from_secs(30)));
    thread::sleep(Duration::from_millis(50));
    client.cancel();

    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.status, Status::Cancelled);

    let addr = spawn_loopback_echo(Duration::from_millis(5));
    client.query(addr.to_string(), None);
    let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(outcome.status, Status::Succeeded);
}
