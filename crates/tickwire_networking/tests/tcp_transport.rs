//! Loopback tests for the TCP transport.

mod support;

use std::collections::BTreeMap;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use support::{wait_until, NET_TIMEOUT};
use tickwire_core::EntityId;
use tickwire_networking::protocol::{Command, EntitySnapshot, Snapshot};
use tickwire_networking::TransportError;
use tickwire_networking::transport::{
    ClientTransport, ConnectionState, ServerTransport, TcpClientTransport, TcpServerTransport,
};

fn connected_pair() -> (TcpClientTransport, TcpServerTransport) {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let client = TcpClientTransport::connect(server.local_addr()).expect("connect");
    assert!(wait_until(NET_TIMEOUT, || server.client_count() == 1));
    (client, server)
}

fn drain_until(server: &TcpServerTransport, count: usize) -> Vec<Command> {
    let mut commands = Vec::new();
    wait_until(NET_TIMEOUT, || {
        server.drain_commands(&mut commands);
        commands.len() >= count
    });
    commands
}

#[test]
fn test_commands_arrive_in_send_order() {
    let (client, server) = connected_pair();
    for i in 0..200 {
        client.send_command(Command::new("seq", json!(i)));
    }

    let commands = drain_until(&server, 200);
    let seen: Vec<u64> = commands.iter().filter_map(|c| c.payload.as_u64()).collect();
    assert_eq!(seen, (0..200).collect::<Vec<u64>>());
    assert!(commands.iter().all(|c| c.origin.is_some() && c.kind == "seq"));
}

#[test]
fn test_commands_from_two_clients_keep_per_client_order() {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let a = TcpClientTransport::connect(server.local_addr()).expect("connect a");
    let b = TcpClientTransport::connect(server.local_addr()).expect("connect b");
    assert!(wait_until(NET_TIMEOUT, || server.client_count() == 2));

    for i in 0..50 {
        a.send_command(Command::new("a", json!(i)));
        b.send_command(Command::new("b", json!(i)));
    }

    let commands = drain_until(&server, 100);
    for kind in ["a", "b"] {
        let from: Vec<&Command> = commands.iter().filter(|c| c.kind == kind).collect();
        let seen: Vec<u64> = from.iter().filter_map(|c| c.payload.as_u64()).collect();
        assert_eq!(seen, (0..50).collect::<Vec<u64>>());
        assert!(from.windows(2).all(|w| w[0].origin == w[1].origin));
    }
    let origin_a = commands.iter().find(|c| c.kind == "a").and_then(|c| c.origin);
    let origin_b = commands.iter().find(|c| c.kind == "b").and_then(|c| c.origin);
    assert_ne!(origin_a, origin_b);
}

#[test]
fn test_receiver_only_sees_latest_snapshot() {
    let (client, server) = connected_pair();
    for tick in 1..=5 {
        server.publish_snapshot(&Snapshot::new(tick));
    }

    // Every publish is either written or replaced in the outbox, and every
    // written frame has reached the client.
    assert!(wait_until(NET_TIMEOUT, || {
        let sent = server.stats();
        sent.frames_sent + sent.snapshots_overwritten == 5
            && client.stats().frames_received == sent.frames_sent
    }));
    assert_eq!(client.receive_snapshot().map(|s| s.tick), Some(5));
    assert!(client.receive_snapshot().is_none());
}

#[test]
fn test_broadcast_reaches_every_client() {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let clients: Vec<TcpClientTransport> = (0..3)
        .map(|_| TcpClientTransport::connect(server.local_addr()).expect("connect"))
        .collect();
    assert!(wait_until(NET_TIMEOUT, || server.client_count() == 3));

    server.publish_snapshot(&Snapshot::new(42));
    for client in &clients {
        let mut got = None;
        assert!(wait_until(NET_TIMEOUT, || {
            if got.is_none() {
                got = client.receive_snapshot();
            }
            got.is_some()
        }));
        assert_eq!(got.map(|s| s.tick), Some(42));
    }
}

#[test]
fn test_client_close_is_idempotent() {
    let (client, server) = connected_pair();
    assert_eq!(client.state(), ConnectionState::Open);
    assert!(client.is_reader_running());

    client.close();
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!client.is_reader_running());

    client.close();
    client.send_command(Command::empty("after-close"));
    assert_eq!(client.state(), ConnectionState::Closed);

    // The server notices the hang-up.
    assert!(wait_until(NET_TIMEOUT, || server.client_count() == 0));
}

#[test]
fn test_concurrent_close_waits_for_reader() {
    let (client, _server) = connected_pair();
    let client = Arc::new(client);

    let closers: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                client.close();
                (client.state(), client.is_reader_running())
            })
        })
        .collect();

    for closer in closers {
        let (state, running) = closer.join().expect("closer panicked");
        assert_eq!(state, ConnectionState::Closed);
        assert!(!running);
    }
}

#[test]
fn test_server_close_disconnects_clients() {
    let (client, server) = connected_pair();

    server.close();
    server.close();
    assert_eq!(server.state(), ConnectionState::Closed);
    assert_eq!(server.client_count(), 0);

    // The client's reader sees end of stream and exits without a close call,
    // and the transport stops reporting itself usable.
    assert!(wait_until(NET_TIMEOUT, || !client.is_reader_running()));
    assert_eq!(client.state(), ConnectionState::Closed);
    client.send_command(Command::empty("too-late"));
    client.close();
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn test_bind_failure_is_reported() {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let clash = TcpServerTransport::bind(server.local_addr());
    assert!(matches!(clash, Err(TransportError::Io(_))));
}

fn crowded_snapshot(tick: u64, entities: usize) -> Snapshot {
    Snapshot {
        tick,
        entities: (0..entities)
            .map(|i| EntitySnapshot {
                id: EntityId::new(format!("entity-{i}")),
                blueprint: "crowd".into(),
                components: BTreeMap::from([("position".to_owned(), json!({ "x": i, "y": i }))]),
            })
            .collect(),
    }
}

#[test]
fn test_stalled_client_does_not_block_publishing() {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    // Connects and never reads a byte.
    let _stalled = TcpStream::connect(server.local_addr()).expect("connect");
    let healthy = TcpClientTransport::connect(server.local_addr()).expect("connect");
    assert!(wait_until(NET_TIMEOUT, || server.client_count() == 2));

    let snapshot = crowded_snapshot(0, 2000);
    let started = Instant::now();
    for tick in 1..=500 {
        server.publish_snapshot(&Snapshot { tick, ..snapshot.clone() });
    }
    assert!(started.elapsed() < NET_TIMEOUT, "publishing took {:?}", started.elapsed());

    // The reading client still converges on the newest snapshot.
    let mut newest = 0;
    assert!(wait_until(NET_TIMEOUT, || {
        if let Some(snapshot) = healthy.receive_snapshot() {
            newest = snapshot.tick;
        }
        newest == 500
    }));

    // Close unblocks the writer stuck on the full socket.
    let started = Instant::now();
    server.close();
    assert!(started.elapsed() < NET_TIMEOUT);
    assert_eq!(server.client_count(), 0);
}

#[test]
fn test_close_returns_promptly_without_clients() {
    let server = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let started = Instant::now();
    server.close();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(server.state(), ConnectionState::Closed);
    assert!(TcpClientTransport::connect(server.local_addr()).is_err());
}
