//! # Tickwire Bouncing Balls
//!
//! Balls bounce inside an arena on the server; clients receive position,
//! colour and radius and print them. Velocity never leaves the server.
//!
//! ## Binaries
//!
//! - `tickwire_server`: TCP server at a fixed tick rate
//! - `tickwire_client`: TCP client with a text renderer
//! - `tickwire_local`: both in one process, stepped in lock-step

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod codec;
pub mod components;
pub mod logging;
pub mod render;
pub mod states;
pub mod systems;

use std::sync::Arc;

use tickwire_networking::{Server, ServerConfig, ServerTransport};

use crate::codec::ball_codec;
use crate::states::{Lobby, Playing, PlayingSettings};
use crate::systems::{BounceSystem, MovementSystem};

/// Builds a bouncing-balls server on `transport`.
///
/// Movement runs before bounce. With `autostart` the server begins in
/// [`Playing`], otherwise in [`Lobby`].
#[must_use]
pub fn build_server(
    config: ServerConfig,
    transport: impl ServerTransport + 'static,
    settings: PlayingSettings,
    autostart: bool,
) -> Server {
    let arena = settings.arena;
    let mut server = Server::new(config, Arc::new(ball_codec()), transport);
    server
        .add_system(MovementSystem)
        .add_system(BounceSystem::new(arena));
    if autostart {
        server.set_state(Playing::new(settings));
    } else {
        server.set_state(Lobby::new(settings));
    }
    server
}
