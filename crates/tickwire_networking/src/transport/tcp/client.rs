//! TCP client: one writer (caller's thread), one reader thread.

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::{is_disconnect, write_frame};
use crate::error::{FrameError, TransportResult};
use crate::protocol::{encode_frame, read_envelope, Command, Envelope, MessageKind, Snapshot};
use crate::transport::{
    AtomicConnectionState, ClientTransport, ConnectionState, LatestSlot, StatCounters,
    TransportStats,
};

#[derive(Debug)]
struct Shared {
    latest: LatestSlot<Snapshot>,
    state: AtomicConnectionState,
    stats: StatCounters,
}

/// Client end of a TCP connection to a simulation server.
///
/// # Example
///
/// ```rust,no_run
/// use tickwire_networking::transport::{ClientTransport, TcpClientTransport};
/// use tickwire_networking::protocol::Command;
///
/// let transport = TcpClientTransport::connect("127.0.0.1:7777")?;
/// transport.send_command(Command::empty("start"));
/// if let Some(snapshot) = transport.receive_snapshot() {
///     println!("tick {}", snapshot.tick);
/// }
/// transport.close();
/// # Ok::<(), tickwire_networking::TransportError>(())
/// ```
#[derive(Debug)]
pub struct TcpClientTransport {
    shared: Arc<Shared>,
    writer: Mutex<TcpStream>,
    /// Separate handle so `close` never waits on the writer lock.
    control: TcpStream,
    reader: Mutex<Option<JoinHandle<()>>>,
    peer: SocketAddr,
}

impl TcpClientTransport {
    /// Connects to `addr` and starts the snapshot reader.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`](crate::TransportError::Io) if the
    /// connection or the reader thread cannot be set up.
    pub fn connect(addr: impl ToSocketAddrs) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let read_half = stream.try_clone()?;
        let control = stream.try_clone()?;

        let shared = Arc::new(Shared {
            latest: LatestSlot::new(),
            state: AtomicConnectionState::new(),
            stats: StatCounters::default(),
        });
        let reader = thread::Builder::new()
            .name(format!("tickwire-client-{peer}"))
            .spawn({
                let shared = Arc::clone(&shared);
                move || read_snapshots(read_half, &shared)
            })?;

        info!(%peer, "connected to server");
        Ok(Self {
            shared,
            writer: Mutex::new(stream),
            control,
            reader: Mutex::new(Some(reader)),
            peer,
        })
    }

    /// Returns the server's address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the connection's lifecycle state.
    ///
    /// Becomes [`ConnectionState::Closed`] on its own once the server hangs
    /// up or the stream fails; there is no reconnect.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Returns true while the reader thread is alive.
    #[must_use]
    pub fn is_reader_running(&self) -> bool {
        self.reader
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Returns transport statistics.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }
}

impl ClientTransport for TcpClientTransport {
    fn send_command(&self, command: Command) {
        if !self.shared.state.is_open() {
            debug!(kind = %command.kind, "transport closing, command dropped");
            return;
        }

        let frame = match Envelope::command(&command)
            .map_err(FrameError::from)
            .and_then(|envelope| encode_frame(&envelope))
        {
            Ok(frame) => frame,
            Err(e) => {
                self.shared.stats.record_error();
                warn!(kind = %command.kind, error = %e, "failed to encode command");
                return;
            }
        };

        let written = write_frame(&mut *self.writer.lock(), &frame, &self.shared.stats);
        if let Err(e) = written {
            if self.shared.state.is_open() {
                warn!(peer = %self.peer, kind = %command.kind, error = %e, "failed to send command");
            } else {
                debug!(kind = %command.kind, "command lost to shutdown");
            }
        }
    }

    fn receive_snapshot(&self) -> Option<Snapshot> {
        self.shared.latest.take()
    }

    fn close(&self) {
        // Holding the reader lock across the join makes concurrent callers
        // wait for the first one to finish.
        let mut reader = self.reader.lock();
        if self.shared.state.begin_closing() {
            if let Err(e) = self.control.shutdown(Shutdown::Both) {
                debug!(error = %e, "socket already shut down");
            }
        }
        if let Some(handle) = reader.take() {
            if handle.join().is_err() {
                warn!(peer = %self.peer, "snapshot reader panicked");
            }
            info!(peer = %self.peer, "disconnected from server");
        }
        self.shared.state.set_closed();
    }
}

impl Drop for TcpClientTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader loop: every snapshot frame replaces the previous unread one.
fn read_snapshots(stream: TcpStream, shared: &Shared) {
    let mut reader = BufReader::new(stream);
    loop {
        let envelope = match read_envelope(&mut reader) {
            Ok(envelope) => envelope,
            Err(e) => {
                if !shared.state.is_open() {
                    debug!(error = %e, "snapshot reader stopping");
                } else if is_disconnect(&e) {
                    info!("server closed the connection");
                } else {
                    shared.stats.record_error();
                    warn!(error = %e, "snapshot stream failed");
                }
                break;
            }
        };
        shared.stats.record_received(envelope.payload.len());

        match envelope.kind {
            MessageKind::Snapshot => match serde_json::from_slice::<Snapshot>(&envelope.payload) {
                Ok(snapshot) => {
                    let tick = snapshot.tick;
                    if shared.latest.put(snapshot) {
                        shared.stats.record_overwrite();
                        trace!(tick, "unread snapshot replaced");
                    }
                }
                Err(e) => {
                    shared.stats.record_error();
                    warn!(error = %e, "dropping malformed snapshot");
                }
            },
            MessageKind::Command => debug!("ignoring command frame from server"),
        }
    }
    // A dead socket is terminal whether or not anyone asked to close it.
    shared.state.set_closed();
}
