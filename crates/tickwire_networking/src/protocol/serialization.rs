//! # Framing
//!
//! Envelopes travel over a byte stream as length-prefixed frames:
//!
//! ```text
//! +--------+-------------------+---------------------+
//! | kind   | payload length    | payload (JSON)      |
//! | 1 byte | 4 bytes, BE       | `length` bytes      |
//! +--------+-------------------+---------------------+
//! ```
//!
//! A frame is always written with a single `write_all`, so frames from
//! different writers never interleave as long as each write holds the
//! stream's lock.

use std::io::{self, Read, Write};

use super::packets::{Envelope, MessageKind};
use crate::error::FrameError;

/// Bytes in a frame header.
pub const HEADER_LEN: usize = 5;

/// Largest payload a peer will accept (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encodes an envelope into a complete frame.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the payload exceeds [`MAX_FRAME_LEN`].
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, FrameError> {
    let len = envelope.payload.len();
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    // MAX_FRAME_LEN fits in u32, so this cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let declared = len as u32;

    let mut frame = Vec::with_capacity(HEADER_LEN + len);
    frame.push(envelope.kind.as_u8());
    frame.extend_from_slice(&declared.to_be_bytes());
    frame.extend_from_slice(&envelope.payload);
    Ok(frame)
}

/// Writes one frame and flushes.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] or the underlying I/O error.
pub fn write_envelope<W: Write>(writer: &mut W, envelope: &Envelope) -> Result<(), FrameError> {
    let frame = encode_frame(envelope)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// Blocks until a full frame arrives or the stream ends.
///
/// # Errors
///
/// - [`FrameError::Closed`] on a clean end of stream before any header byte
/// - [`FrameError::Truncated`] if the stream ends inside a frame
/// - [`FrameError::UnknownKind`] / [`FrameError::TooLarge`] on a bad header
/// - [`FrameError::Io`] for anything else
pub fn read_envelope<R: Read>(reader: &mut R) -> Result<Envelope, FrameError> {
    let mut kind = [0_u8; 1];
    loop {
        match reader.read(&mut kind) {
            Ok(0) => return Err(FrameError::Closed),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    let mut len = [0_u8; 4];
    read_exact(reader, &mut len)?;
    let len = u32::from_be_bytes(len) as usize;

    let kind = MessageKind::from_u8(kind[0]).ok_or(FrameError::UnknownKind(kind[0]))?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0_u8; len];
    read_exact(reader, &mut payload)?;
    Ok(Envelope { kind, payload })
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => FrameError::Truncated,
        _ => FrameError::Io(e),
    })
}
