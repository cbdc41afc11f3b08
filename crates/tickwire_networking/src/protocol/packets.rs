//! # Message Definitions
//!
//! The two messages that cross the wire, and the envelope that tags them.
//!
//! ```text
//! CLIENT                               SERVER
//!   |--- Command {kind, payload} -------->|   queued, applied next tick
//!   |<-- Snapshot {tick, entities} -------|   every N ticks, latest wins
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tickwire_core::EntityId;

/// Server-assigned identifier for one connected client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tag carried in every frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Client -> server intent.
    Command = 1,
    /// Server -> client world projection.
    Snapshot = 2,
}

impl MessageKind {
    /// Returns the wire byte.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses a wire byte.
    #[inline]
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Command),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// A client's request to change the simulation.
///
/// Commands are intents, not state: the active simulation state decides
/// what (if anything) each one does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Discriminator the simulation state dispatches on.
    pub kind: String,
    /// Kind-specific data; `null` when the kind needs none.
    #[serde(default)]
    pub payload: Value,
    /// Connection the command arrived on. Set by the receiving transport,
    /// never sent over the wire.
    #[serde(skip)]
    pub origin: Option<ConnectionId>,
}

impl Command {
    /// Creates a command with a raw JSON payload.
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            origin: None,
        }
    }

    /// Creates a command with no payload.
    #[must_use]
    pub fn empty(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Creates a command whose payload is `payload` serialized to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if `payload` cannot be represented.
    pub fn with_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Deserializes the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the payload has the wrong shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// One entity's visible state at a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Stable identity.
    pub id: EntityId,
    /// Blueprint the client builds a new entity from.
    pub blueprint: String,
    /// Visible components by key. Sorted so encoding is deterministic.
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
}

/// The visible world at one tick, as broadcast to clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick this snapshot was taken at.
    pub tick: u64,
    /// Every visible entity, in server world order.
    #[serde(default)]
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Creates an empty snapshot for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            entities: Vec::new(),
        }
    }

    /// Returns the projection of entity `id`, if present.
    #[must_use]
    pub fn entity(&self, id: &str) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|entity| entity.id.as_str() == id)
    }

    /// Returns the number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is visible.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A decoded message of either kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// A command from a client.
    Command(Command),
    /// A snapshot from the server.
    Snapshot(Snapshot),
}

/// A kind tag plus a serialized payload; the unit framed on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// What the payload holds.
    pub kind: MessageKind,
    /// JSON bytes.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wraps a command.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn command(command: &Command) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: MessageKind::Command,
            payload: serde_json::to_vec(command)?,
        })
    }

    /// Wraps a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn snapshot(snapshot: &Snapshot) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: MessageKind::Snapshot,
            payload: serde_json::to_vec(snapshot)?,
        })
    }

    /// Deserializes the payload as the message its kind names.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the payload is malformed.
    pub fn decode(&self) -> Result<Message, serde_json::Error> {
        Ok(match self.kind {
            MessageKind::Command => Message::Command(serde_json::from_slice(&self.payload)?),
            MessageKind::Snapshot => Message::Snapshot(serde_json::from_slice(&self.payload)?),
        })
    }
}
