//! # Transport Layer
//!
//! Moves commands client -> server and snapshots server -> client.
//!
//! ## Design
//!
//! - Commands are a FIFO: nothing is dropped, order per client is kept
//! - Snapshots are "latest wins": a slow reader only ever sees the newest
//! - Every operation takes `&self`, so a transport can be shared between
//!   the thread that owns the simulation and the thread that closes it
//! - Runtime failures are logged, never returned; only constructors fail
//!
//! Two implementations share these semantics: [`local`] (in-process,
//! lock-step friendly) and [`tcp`] (framed JSON over TCP).

pub mod local;
mod slot;
pub mod tcp;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

pub use local::{local_pair, LocalClientTransport, LocalServerTransport};
pub use slot::LatestSlot;
pub use tcp::{TcpClientTransport, TcpServerTransport};

use crate::protocol::{Command, Snapshot};

/// Client side of a transport.
pub trait ClientTransport: Send + Sync {
    /// Sends a command to the server. Never blocks on the simulation.
    ///
    /// After [`ClientTransport::close`] this is a no-op.
    fn send_command(&self, command: Command);

    /// Takes the most recent snapshot not yet taken, if any.
    ///
    /// Snapshots that were overwritten before being taken are gone.
    fn receive_snapshot(&self) -> Option<Snapshot>;

    /// Closes the transport and waits for its background work to finish.
    ///
    /// Idempotent, and safe to call from several threads at once.
    fn close(&self);
}

/// Server side of a transport.
pub trait ServerTransport: Send + Sync {
    /// Makes `snapshot` the latest available to every connected client.
    fn publish_snapshot(&self, snapshot: &Snapshot);

    /// Moves every queued command into `into`, oldest first.
    fn drain_commands(&self, into: &mut Vec<Command>);

    /// Number of clients currently connected.
    fn client_count(&self) -> usize;

    /// Closes the transport and every client connection.
    ///
    /// Idempotent, and safe to call from several threads at once.
    fn close(&self);
}

impl<T: ClientTransport + ?Sized> ClientTransport for Arc<T> {
    fn send_command(&self, command: Command) {
        (**self).send_command(command);
    }

    fn receive_snapshot(&self) -> Option<Snapshot> {
        (**self).receive_snapshot()
    }

    fn close(&self) {
        (**self).close();
    }
}

impl<T: ServerTransport + ?Sized> ServerTransport for Arc<T> {
    fn publish_snapshot(&self, snapshot: &Snapshot) {
        (**self).publish_snapshot(snapshot);
    }

    fn drain_commands(&self, into: &mut Vec<Command>) {
        (**self).drain_commands(into);
    }

    fn client_count(&self) -> usize {
        (**self).client_count()
    }

    fn close(&self) {
        (**self).close();
    }
}

/// Lifecycle of a transport or a single connection.
///
/// Only ever moves forward: `Open -> Closing -> Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Usable.
    Open = 0,
    /// Close requested; background work is winding down.
    Closing = 1,
    /// Background work has exited.
    Closed = 2,
}

/// A [`ConnectionState`] shared between threads.
#[derive(Debug)]
pub(crate) struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Open as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }

    /// `Open -> Closing`. Returns true for exactly one caller.
    pub(crate) fn begin_closing(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Forces `Closed`, whatever the current state.
    pub(crate) fn set_closed(&self) {
        self.0.store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

/// Transport statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames written.
    pub frames_sent: u64,
    /// Frames read.
    pub frames_received: u64,
    /// Payload bytes written (headers excluded).
    pub bytes_sent: u64,
    /// Payload bytes read (headers excluded).
    pub bytes_received: u64,
    /// Snapshots replaced before anyone took them.
    pub snapshots_overwritten: u64,
    /// Frames that failed to write or decode.
    pub errors: u64,
}

/// Lock-free counters behind [`TransportStats`].
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    snapshots_overwritten: AtomicU64,
    errors: AtomicU64,
}

impl StatCounters {
    pub(crate) fn record_sent(&self, payload_len: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, payload_len: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_overwrite(&self) {
        self.snapshots_overwritten.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransportStats {
        TransportStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            snapshots_overwritten: self.snapshots_overwritten.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
