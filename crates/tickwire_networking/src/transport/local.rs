//! # In-Process Transport
//!
//! Client and server in one process, no sockets. Commands go through an
//! unbounded crossbeam channel; each client gets its own snapshot slot.
//!
//! Nothing here spawns a thread, so a caller that steps the server by hand
//! gets fully deterministic delivery: a command sent before `step` is seen
//! by that step, and a snapshot published by `step` is visible right after.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{ClientTransport, LatestSlot, ServerTransport, StatCounters, TransportStats};
use crate::protocol::{Command, ConnectionId, Snapshot};

/// Creates a connected client/server pair.
#[must_use]
pub fn local_pair() -> (LocalClientTransport, LocalServerTransport) {
    let server = LocalServerTransport::new();
    let client = server.connect();
    (client, server)
}

/// One client's view of the hub.
#[derive(Debug)]
struct Endpoint {
    id: ConnectionId,
    snapshots: LatestSlot<Snapshot>,
    closed: AtomicBool,
}

#[derive(Debug)]
struct Hub {
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
    endpoints: Mutex<Vec<Arc<Endpoint>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    stats: StatCounters,
}

/// Server side of the in-process transport.
///
/// Cheap to clone; clones share the same hub. Call
/// [`LocalServerTransport::connect`] to attach more clients.
#[derive(Clone, Debug)]
pub struct LocalServerTransport {
    hub: Arc<Hub>,
}

impl LocalServerTransport {
    /// Creates a hub with no clients.
    #[must_use]
    pub fn new() -> Self {
        let (commands_tx, commands_rx) = unbounded();
        Self {
            hub: Arc::new(Hub {
                commands_tx,
                commands_rx,
                endpoints: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                stats: StatCounters::default(),
            }),
        }
    }

    /// Attaches a new client.
    ///
    /// A client attached after [`ServerTransport::close`] starts closed.
    #[must_use]
    pub fn connect(&self) -> LocalClientTransport {
        let endpoint = Arc::new(Endpoint {
            id: ConnectionId(self.hub.next_id.fetch_add(1, Ordering::Relaxed)),
            snapshots: LatestSlot::new(),
            closed: AtomicBool::new(false),
        });
        // Checked under the list lock so a concurrent close cannot miss us.
        let mut endpoints = self.hub.endpoints.lock();
        if self.hub.closed.load(Ordering::Acquire) {
            endpoint.closed.store(true, Ordering::Release);
        } else {
            endpoints.push(Arc::clone(&endpoint));
            debug!(connection = %endpoint.id, "local client attached");
        }
        drop(endpoints);
        LocalClientTransport {
            hub: Arc::clone(&self.hub),
            endpoint,
        }
    }

    /// Returns transport statistics.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.hub.stats.snapshot()
    }
}

impl Default for LocalServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerTransport for LocalServerTransport {
    fn publish_snapshot(&self, snapshot: &Snapshot) {
        let mut endpoints = self.hub.endpoints.lock();
        endpoints.retain(|endpoint| !endpoint.closed.load(Ordering::Acquire));
        for endpoint in endpoints.iter() {
            if endpoint.snapshots.put(snapshot.clone()) {
                self.hub.stats.record_overwrite();
                trace!(connection = %endpoint.id, tick = snapshot.tick, "unread snapshot replaced");
            }
            self.hub.stats.record_sent(0);
        }
    }

    fn drain_commands(&self, into: &mut Vec<Command>) {
        into.extend(self.hub.commands_rx.try_iter());
    }

    fn client_count(&self) -> usize {
        self.hub
            .endpoints
            .lock()
            .iter()
            .filter(|endpoint| !endpoint.closed.load(Ordering::Acquire))
            .count()
    }

    fn close(&self) {
        let mut endpoints = self.hub.endpoints.lock();
        if self.hub.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for endpoint in endpoints.drain(..) {
            endpoint.closed.store(true, Ordering::Release);
        }
        debug!("local transport closed");
    }
}

/// Client side of the in-process transport.
#[derive(Debug)]
pub struct LocalClientTransport {
    hub: Arc<Hub>,
    endpoint: Arc<Endpoint>,
}

impl LocalClientTransport {
    /// Identifier the server sees on this client's commands.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.endpoint.id
    }

    /// Returns true once either side has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.endpoint.closed.load(Ordering::Acquire) || self.hub.closed.load(Ordering::Acquire)
    }
}

impl ClientTransport for LocalClientTransport {
    fn send_command(&self, mut command: Command) {
        if self.is_closed() {
            debug!(kind = %command.kind, "transport closed, command dropped");
            return;
        }
        command.origin = Some(self.endpoint.id);
        // The hub owns the receiver, so the channel cannot be disconnected
        // while `self.hub` is alive.
        if self.hub.commands_tx.send(command).is_ok() {
            self.hub.stats.record_received(0);
        }
    }

    fn receive_snapshot(&self) -> Option<Snapshot> {
        self.endpoint.snapshots.take()
    }

    fn close(&self) {
        if !self.endpoint.closed.swap(true, Ordering::AcqRel) {
            self.endpoint.snapshots.take();
            debug!(connection = %self.endpoint.id, "local client closed");
        }
    }
}

impl Drop for LocalClientTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drained(server: &LocalServerTransport) -> Vec<Command> {
        let mut commands = Vec::new();
        server.drain_commands(&mut commands);
        commands
    }

    #[test]
    fn test_commands_arrive_in_order_with_origin() {
        let (client, server) = local_pair();
        for i in 0..5 {
            client.send_command(Command::new("n", i.into()));
        }

        let commands = drained(&server);
        let payloads: Vec<u64> = commands.iter().filter_map(|c| c.payload.as_u64()).collect();
        assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
        assert!(commands.iter().all(|c| c.origin == Some(client.id())));
        assert!(drained(&server).is_empty());
    }

    #[test]
    fn test_only_latest_snapshot_is_received() {
        let (client, server) = local_pair();
        for tick in 1..=5 {
            server.publish_snapshot(&Snapshot::new(tick));
        }

        assert_eq!(client.receive_snapshot().map(|s| s.tick), Some(5));
        assert!(client.receive_snapshot().is_none());
        assert_eq!(server.stats().snapshots_overwritten, 4);
    }

    #[test]
    fn test_every_client_gets_each_snapshot() {
        let server = LocalServerTransport::new();
        let a = server.connect();
        let b = server.connect();
        assert_ne!(a.id(), b.id());
        assert_eq!(server.client_count(), 2);

        server.publish_snapshot(&Snapshot::new(3));
        assert_eq!(a.receive_snapshot().map(|s| s.tick), Some(3));
        assert_eq!(b.receive_snapshot().map(|s| s.tick), Some(3));
    }

    #[test]
    fn test_close_is_idempotent_and_silences_sends() {
        let (client, server) = local_pair();
        client.close();
        client.close();
        client.send_command(Command::empty("ignored"));
        assert!(drained(&server).is_empty());
        assert_eq!(server.client_count(), 0);

        server.close();
        server.close();
        let late = server.connect();
        assert!(late.is_closed());
    }

    #[test]
    fn test_server_close_detaches_clients() {
        let (client, server) = local_pair();
        server.close();
        server.publish_snapshot(&Snapshot::new(1));
        assert!(client.is_closed());
        assert!(client.receive_snapshot().is_none());
    }

    #[test]
    fn test_connect_racing_close_never_outlives_it() {
        for _ in 0..50 {
            let server = LocalServerTransport::new();
            let connectors: Vec<_> = (0..4)
                .map(|_| {
                    let server = server.clone();
                    std::thread::spawn(move || (0..8).map(|_| server.connect()).collect::<Vec<_>>())
                })
                .collect();
            server.close();

            let clients: Vec<LocalClientTransport> = connectors
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect();
            server.publish_snapshot(&Snapshot::new(1));

            assert_eq!(server.client_count(), 0);
            for client in &clients {
                assert!(client.endpoint.closed.load(Ordering::Acquire));
                assert!(client.receive_snapshot().is_none());
            }
        }
    }
}
