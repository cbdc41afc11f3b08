//! # TCP Transport
//!
//! Framed JSON over TCP with `TCP_NODELAY`. Every connection gets a
//! dedicated reader thread that blocks on the socket. Clients write
//! commands on the caller's thread; the server hands snapshots to one
//! writer thread per client so publishing never waits on a socket.
//!
//! Closing shuts the socket down, which unblocks the blocked threads, then
//! joins them.

mod client;
mod server;

pub use client::TcpClientTransport;
pub use server::TcpServerTransport;

use std::io::{self, Write};

use super::StatCounters;
use crate::error::FrameError;

/// Writes one pre-encoded frame.
fn write_frame(stream: &mut impl Write, frame: &[u8], stats: &StatCounters) -> Result<(), FrameError> {
    match stream.write_all(frame).and_then(|()| stream.flush()) {
        Ok(()) => {
            stats.record_sent(frame.len().saturating_sub(crate::protocol::HEADER_LEN));
            Ok(())
        }
        Err(e) => {
            stats.record_error();
            Err(e.into())
        }
    }
}

/// True for errors that just mean "the other side or we hung up".
fn is_disconnect(error: &FrameError) -> bool {
    match error {
        FrameError::Closed | FrameError::Truncated => true,
        FrameError::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
