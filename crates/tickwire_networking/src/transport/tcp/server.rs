//! TCP server: an accept thread, plus a reader and a writer thread per
//! client.
//!
//! Publishing never touches a socket. Each client has a one-frame outbox
//! that the newest snapshot overwrites; its writer thread drains it. A
//! client that stops reading only falls behind, it never stalls the tick.

use std::collections::BTreeMap;
use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::{is_disconnect, write_frame};
use crate::error::{FrameError, TransportResult};
use crate::protocol::{
    encode_frame, read_envelope, Command, ConnectionId, Envelope, MessageKind, Snapshot,
};
use crate::transport::{
    AtomicConnectionState, ConnectionState, LatestSlot, ServerTransport, StatCounters,
    TransportStats,
};

/// How long the accept thread sleeps when no client is waiting.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// One connected client.
#[derive(Debug)]
struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    /// Newest unsent snapshot frame.
    outbox: LatestSlot<Arc<Vec<u8>>>,
    /// Capacity one: a pending wake-up already covers any later frame.
    wake: Sender<()>,
    closed: AtomicBool,
    control: TcpStream,
}

impl Peer {
    /// Queues `frame`, replacing any unsent one. Returns true on replace.
    fn offer(&self, frame: Arc<Vec<u8>>) -> bool {
        let replaced = self.outbox.put(frame);
        let _ = self.wake.try_send(());
        replaced
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Unblocks both threads of this peer. Idempotent.
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            debug!(connection = %self.id, error = %e, "socket already shut down");
        }
        let _ = self.wake.try_send(());
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicConnectionState,
    /// Ordered by id so broadcasts go out in connection order.
    peers: Mutex<BTreeMap<ConnectionId, Arc<Peer>>>,
    /// Reader and writer threads of every connection.
    workers: Mutex<Vec<JoinHandle<()>>>,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
    next_id: AtomicU64,
    stats: StatCounters,
}

impl Shared {
    fn drop_peer(&self, id: ConnectionId) {
        if let Some(peer) = self.peers.lock().remove(&id) {
            peer.shutdown();
        }
    }
}

/// Listening end of the TCP transport.
///
/// Accepts any number of clients, funnels their commands into one FIFO,
/// and broadcasts every published snapshot to all of them.
#[derive(Debug)]
pub struct TcpServerTransport {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServerTransport {
    /// Binds to `addr` and starts accepting clients.
    ///
    /// Bind to port 0 to let the OS pick; [`TcpServerTransport::local_addr`]
    /// reports the result.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`](crate::TransportError::Io) if the
    /// socket cannot be bound or the accept thread cannot be spawned.
    pub fn bind(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let (commands_tx, commands_rx) = unbounded();

        let shared = Arc::new(Shared {
            state: AtomicConnectionState::new(),
            peers: Mutex::new(BTreeMap::new()),
            workers: Mutex::new(Vec::new()),
            commands_tx,
            commands_rx,
            next_id: AtomicU64::new(0),
            stats: StatCounters::default(),
        });
        let acceptor = thread::Builder::new()
            .name(format!("tickwire-accept-{local_addr}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || accept_clients(&listener, &shared)
            })?;

        info!(%local_addr, "listening for clients");
        Ok(Self {
            shared,
            local_addr,
            acceptor: Mutex::new(Some(acceptor)),
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the transport's lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Returns transport statistics.
    ///
    /// `frames_sent` counts frames actually written; a snapshot replaced
    /// in a client's outbox before its writer got to it counts in
    /// `snapshots_overwritten` instead.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }
}

impl ServerTransport for TcpServerTransport {
    fn publish_snapshot(&self, snapshot: &Snapshot) {
        if !self.shared.state.is_open() {
            return;
        }
        let frame = match Envelope::snapshot(snapshot)
            .map_err(FrameError::from)
            .and_then(|envelope| encode_frame(&envelope))
        {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                self.shared.stats.record_error();
                warn!(tick = snapshot.tick, error = %e, "failed to encode snapshot");
                return;
            }
        };

        for peer in self.shared.peers.lock().values() {
            if peer.offer(Arc::clone(&frame)) {
                self.shared.stats.record_overwrite();
                trace!(connection = %peer.id, tick = snapshot.tick, "unsent snapshot replaced");
            }
        }
    }

    fn drain_commands(&self, into: &mut Vec<Command>) {
        into.extend(self.shared.commands_rx.try_iter());
    }

    fn client_count(&self) -> usize {
        self.shared.peers.lock().len()
    }

    fn close(&self) {
        // Serializes concurrent callers: the second waits until the first is done.
        let mut acceptor = self.acceptor.lock();
        self.shared.state.begin_closing();
        if let Some(handle) = acceptor.take() {
            if handle.join().is_err() {
                warn!("accept thread panicked");
            }
        }

        // No new peers can appear past this point.
        let peers: Vec<Arc<Peer>> = {
            let mut registry = self.shared.peers.lock();
            std::mem::take(&mut *registry).into_values().collect()
        };
        for peer in &peers {
            peer.shutdown();
        }
        let workers = std::mem::take(&mut *self.shared.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("connection thread panicked");
            }
        }

        if self.shared.state.get() != ConnectionState::Closed {
            info!(local_addr = %self.local_addr, clients = peers.len(), "server transport closed");
        }
        self.shared.state.set_closed();
    }
}

impl Drop for TcpServerTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_clients(listener: &TcpListener, shared: &Arc<Shared>) {
    while shared.state.is_open() {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(e) = register(shared, stream) {
                    warn!(error = %e, "failed to set up client connection");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("accept thread exiting");
}

fn register(shared: &Arc<Shared>, stream: TcpStream) -> io::Result<()> {
    // Some platforms hand out sockets that inherit the listener's mode.
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let addr = stream.peer_addr()?;
    let read_half = stream.try_clone()?;
    let control = stream.try_clone()?;
    let id = ConnectionId(shared.next_id.fetch_add(1, Ordering::Relaxed));
    let (wake, woken) = bounded(1);

    let peer = Arc::new(Peer {
        id,
        addr,
        outbox: LatestSlot::new(),
        wake,
        closed: AtomicBool::new(false),
        control,
    });
    shared.peers.lock().insert(id, Arc::clone(&peer));

    let reader = thread::Builder::new()
        .name(format!("tickwire-conn-{}-rx", id.0))
        .spawn({
            let shared = Arc::clone(shared);
            move || read_commands(id, read_half, &shared)
        });
    let reader = match reader {
        Ok(reader) => reader,
        Err(e) => {
            shared.drop_peer(id);
            return Err(e);
        }
    };
    let writer = thread::Builder::new()
        .name(format!("tickwire-conn-{}-tx", id.0))
        .spawn({
            let shared = Arc::clone(shared);
            let peer = Arc::clone(&peer);
            move || write_snapshots(&peer, stream, &woken, &shared)
        });

    let mut workers = shared.workers.lock();
    workers.retain(|handle| !handle.is_finished());
    workers.push(reader);
    match writer {
        Ok(writer) => workers.push(writer),
        Err(e) => {
            drop(workers);
            shared.drop_peer(id);
            return Err(e);
        }
    }
    info!(connection = %id, %addr, "client connected");
    Ok(())
}

/// Writer loop for one client: sends whatever is newest in its outbox.
fn write_snapshots(peer: &Peer, mut stream: TcpStream, woken: &Receiver<()>, shared: &Shared) {
    while woken.recv().is_ok() {
        if peer.is_closed() {
            break;
        }
        let Some(frame) = peer.outbox.take() else {
            continue;
        };
        if let Err(e) = write_frame(&mut stream, &frame, &shared.stats) {
            if peer.is_closed() || !shared.state.is_open() {
                debug!(connection = %peer.id, "snapshot writer stopping");
            } else {
                warn!(connection = %peer.id, addr = %peer.addr, error = %e, "dropping client after failed send");
            }
            break;
        }
    }
    shared.drop_peer(peer.id);
}

/// Reader loop for one client: decoded commands join the shared FIFO.
fn read_commands(id: ConnectionId, stream: TcpStream, shared: &Shared) {
    let mut reader = BufReader::new(stream);
    loop {
        let envelope = match read_envelope(&mut reader) {
            Ok(envelope) => envelope,
            Err(e) => {
                if !shared.state.is_open() {
                    debug!(connection = %id, "command reader stopping");
                } else if is_disconnect(&e) {
                    info!(connection = %id, "client disconnected");
                } else {
                    shared.stats.record_error();
                    warn!(connection = %id, error = %e, "dropping client after bad frame");
                }
                break;
            }
        };
        shared.stats.record_received(envelope.payload.len());

        match envelope.kind {
            MessageKind::Command => match serde_json::from_slice::<Command>(&envelope.payload) {
                Ok(mut command) => {
                    command.origin = Some(id);
                    if shared.commands_tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    shared.stats.record_error();
                    warn!(connection = %id, error = %e, "dropping malformed command");
                }
            },
            MessageKind::Snapshot => debug!(connection = %id, "ignoring snapshot frame from client"),
        }
    }

    shared.drop_peer(id);
}
