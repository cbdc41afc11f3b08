//! # Tickwire Networking
//!
//! Authoritative fixed-tick simulation server and render-only clients.
//!
//! ## Architecture
//!
//! - **Protocol**: commands and snapshots as kind/length framed JSON
//! - **Transport**: in-process or TCP, same semantics either way
//! - **Codec**: decides which parts of the server world clients see
//! - **Server**: steps the world at a fixed rate under a state machine
//! - **Client**: applies the newest snapshot and renders
//!
//! ```text
//! CLIENT                                   SERVER
//!   |--- Command "spawn_ball" ------------->|  queued
//!   |                                       |  next tick: state handles it,
//!   |                                       |  systems run, tick += 1
//!   |<-- Snapshot {tick: 12, entities} -----|  every N ticks
//!   |  decode, render                       |
//! ```
//!
//! The server never trusts clients with state. Clients only send intents.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tickwire_core::World;
//! use tickwire_networking::codec::ComponentCodec;
//! use tickwire_networking::server::{Server, SimulationState, Transition};
//! use tickwire_networking::transport::local_pair;
//! use tickwire_networking::ServerConfig;
//!
//! struct Idle;
//!
//! impl SimulationState for Idle {
//!     fn tick(&mut self, _world: &mut World, tick: u64) -> Transition {
//!         if tick == 3 { Transition::Finish } else { Transition::Stay }
//!     }
//! }
//!
//! let (_client, transport) = local_pair();
//! let config = ServerConfig { snapshot_every: 1, ..ServerConfig::default() };
//! let mut server = Server::new(config, Arc::new(ComponentCodec::builder().build()), transport);
//! server.set_state(Idle);
//!
//! while server.step()? == tickwire_networking::server::StepOutcome::Continue {}
//! assert_eq!(server.tick(), 3);
//! assert_eq!(server.snapshots_published(), 3);
//! # Ok::<(), tickwire_networking::SimulationError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
mod stop;
pub mod transport;

pub use client::{Client, ClientState, ClientTransition, FrameOutcome};
pub use codec::{ComponentCodec, SnapshotCodec};
pub use config::{ClientConfig, ServerConfig, TickwireConfig};
pub use error::{
    CodecError, CommandError, ConfigError, FrameError, SimulationError, TransportError,
};
pub use protocol::{Command, ConnectionId, EntitySnapshot, Snapshot};
pub use server::{CommandRouter, RunningServer, Server, SimulationState, StepOutcome, Transition};
pub use stop::StopHandle;
pub use transport::{ClientTransport, ConnectionState, ServerTransport};

/// Default server tick rate (ticks per second).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Default snapshot cadence (one snapshot every N ticks).
pub const DEFAULT_SNAPSHOT_EVERY: u32 = 3;

/// Default client frame rate (frames per second).
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Default listen / connect address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:7777";
