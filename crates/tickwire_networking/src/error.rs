//! # Networking Error Types
//!
//! One enum per concern. Transports only surface errors from their
//! constructors; once running, failures are logged and absorbed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tickwire_core::{EntityId, SystemError};

/// Errors while reading or writing a single frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The peer closed the stream cleanly between frames.
    #[error("connection closed")]
    Closed,

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame")]
    Truncated,

    /// The header carried a kind byte this protocol does not define.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// The declared payload length exceeds the frame limit.
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Declared payload length.
        len: usize,
        /// Maximum accepted payload length.
        max: usize,
    },

    /// The payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised while setting up a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connect, bind, or thread spawn failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while applying a snapshot to a world.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A new identity carried a blueprint nobody registered.
    #[error("entity {entity} uses unknown blueprint `{blueprint}`")]
    UnknownBlueprint {
        /// The entity being created.
        entity: EntityId,
        /// The unregistered blueprint name.
        blueprint: String,
    },

    /// A projection carried a component key this codec does not know.
    #[error("entity {entity} carries unknown component `{component}`")]
    UnknownComponent {
        /// The entity being updated.
        entity: EntityId,
        /// The unknown component key.
        component: String,
    },

    /// A component value did not match its declared shape.
    #[error("component `{component}` on entity {entity} is malformed: {source}")]
    InvalidComponent {
        /// The entity being updated.
        entity: EntityId,
        /// The component key.
        component: String,
        /// The deserialization failure.
        source: serde_json::Error,
    },
}

/// Errors a simulation state may return for a single command.
///
/// The server logs these and keeps going; one bad command never stops a tick.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The active state has no handler for this kind.
    #[error("no handler for command `{0}`")]
    UnknownCommand(String),

    /// The payload did not match the handler's expected shape.
    #[error("invalid payload for command `{kind}`: {source}")]
    InvalidPayload {
        /// The command kind.
        kind: String,
        /// The deserialization failure.
        source: serde_json::Error,
    },

    /// The handler understood the command and refused it.
    #[error("command `{kind}` rejected: {reason}")]
    Rejected {
        /// The command kind.
        kind: String,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors that stop the simulation loop.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// A system failed; the tick in progress was aborted.
    #[error("system `{system}` failed during tick {tick}: {source}")]
    System {
        /// Name of the failing system.
        system: String,
        /// The tick that was being computed.
        tick: u64,
        /// The system's error.
        source: SystemError,
    },

    /// The server was stepped with no state installed, or after the state
    /// machine finished.
    #[error("no simulation state is active")]
    NoActiveState,

    /// The simulation thread panicked.
    #[error("simulation thread panicked")]
    Panicked,
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for transport setup.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for simulation stepping.
pub type SimulationResult<T> = Result<T, SimulationError>;
