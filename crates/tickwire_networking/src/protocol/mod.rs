//! # Wire Protocol
//!
//! Commands, snapshots, and the framing that carries them over a stream.
//! Payloads are JSON so that any client able to speak TCP can join.

mod packets;
mod serialization;

pub use packets::{
    Command, ConnectionId, EntitySnapshot, Envelope, Message, MessageKind, Snapshot,
};
pub use serialization::{
    encode_frame, read_envelope, write_envelope, HEADER_LEN, MAX_FRAME_LEN,
};
