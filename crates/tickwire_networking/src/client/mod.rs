//! # Client Runtime
//!
//! Render-only client: it never simulates, it only mirrors.
//!
//! ```text
//! frame():
//!   snapshot = transport.receive_snapshot()   (latest only, may be none)
//!   if snapshot.tick > last applied tick:
//!     codec.decode(snapshot, world)
//!     state.update(world, snapshot) -> Stay | Switch(next) | Finish
//! ```
//!
//! Commands go straight out through the transport; their effect shows up
//! in a later snapshot.

use std::sync::Arc;

use tickwire_core::World;
use tracing::{debug, info, warn};

use crate::codec::SnapshotCodec;
use crate::protocol::{Command, Snapshot};
use crate::server::TickLoop;
use crate::stop::StopHandle;
use crate::transport::ClientTransport;

/// What the active client state wants after a snapshot.
pub enum ClientTransition {
    /// Keep the current state.
    Stay,
    /// Replace the current state.
    Switch(Box<dyn ClientState>),
    /// The client is done.
    Finish,
}

/// One mode of the client (waiting for a match, watching, ...).
pub trait ClientState: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called after each applied snapshot, with the world already updated.
    fn update(&mut self, world: &World, snapshot: &Snapshot) -> ClientTransition;

    /// Returns true once this state considers the client finished.
    fn done(&self) -> bool {
        false
    }
}

/// Result of one [`Client::frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing new to apply.
    Idle,
    /// A snapshot for `tick` was applied.
    Applied {
        /// Tick of the applied snapshot.
        tick: u64,
    },
    /// The client state machine finished.
    Finished,
}

/// Mirrors the server's visible world from snapshots.
pub struct Client {
    world: World,
    codec: Arc<dyn SnapshotCodec>,
    transport: Box<dyn ClientTransport>,
    state: Option<Box<dyn ClientState>>,
    last_tick: Option<u64>,
    finished: bool,
    stop: StopHandle,
}

impl Client {
    /// Creates a client with an empty world and no state.
    ///
    /// Without a state the client still applies snapshots; it just never
    /// finishes on its own.
    #[must_use]
    pub fn new(codec: Arc<dyn SnapshotCodec>, transport: impl ClientTransport + 'static) -> Self {
        Self {
            world: World::new(),
            codec,
            transport: Box::new(transport),
            state: None,
            last_tick: None,
            finished: false,
            stop: StopHandle::new(),
        }
    }

    /// Installs the active state, replacing any current one.
    pub fn set_state(&mut self, state: impl ClientState + 'static) -> &mut Self {
        info!(state = state.name(), "client state installed");
        self.state = Some(Box::new(state));
        self.finished = false;
        self
    }

    /// Sends a command to the server.
    pub fn send_command(&self, command: Command) {
        self.transport.send_command(command);
    }

    /// Applies the latest snapshot, if there is a new one.
    ///
    /// Snapshots at or before the last applied tick are ignored. A snapshot
    /// that fails to decode is logged and skipped; the world may be left
    /// partially updated until the next one arrives.
    pub fn frame(&mut self) -> FrameOutcome {
        if self.finished {
            return FrameOutcome::Finished;
        }
        let Some(snapshot) = self.transport.receive_snapshot() else {
            return FrameOutcome::Idle;
        };
        if self.last_tick.is_some_and(|last| snapshot.tick <= last) {
            debug!(tick = snapshot.tick, last = ?self.last_tick, "ignoring stale snapshot");
            return FrameOutcome::Idle;
        }
        if let Err(e) = self.codec.decode(&snapshot, &mut self.world) {
            warn!(tick = snapshot.tick, error = %e, "dropping snapshot that failed to decode");
            return FrameOutcome::Idle;
        }
        self.last_tick = Some(snapshot.tick);

        if let Some(state) = self.state.as_mut() {
            match state.update(&self.world, &snapshot) {
                ClientTransition::Stay => {}
                ClientTransition::Switch(next) => {
                    info!(tick = snapshot.tick, from = state.name(), to = next.name(), "client state switched");
                    *state = next;
                }
                ClientTransition::Finish => {
                    info!(tick = snapshot.tick, state = state.name(), "client finished");
                    self.state = None;
                    self.finished = true;
                    return FrameOutcome::Finished;
                }
            }
            if self.state.as_ref().is_some_and(|state| state.done()) {
                self.finished = true;
                return FrameOutcome::Finished;
            }
        }
        FrameOutcome::Applied {
            tick: snapshot.tick,
        }
    }

    /// Runs frames at `frame_rate`, calling `render` after each one, until
    /// the state machine finishes or the stop handle fires.
    ///
    /// Returns the number of frames rendered.
    pub fn run(&mut self, frame_rate: u32, mut render: impl FnMut(&World)) -> u64 {
        let mut frame_loop = TickLoop::new(frame_rate);
        info!(frame_rate, "client loop started");

        let mut frames = 0;
        while !self.stop.is_stopped() {
            frame_loop.wait_for_next_tick();
            if !frame_loop.should_tick() {
                continue;
            }
            let start = frame_loop.begin_tick();
            // Missed frames are not replayed.
            frame_loop.discard_backlog();
            let outcome = self.frame();
            render(&self.world);
            frame_loop.end_tick(start);
            frames += 1;
            if outcome == FrameOutcome::Finished {
                break;
            }
        }

        info!(frames, last_tick = ?self.last_tick, "client loop exited");
        frames
    }

    /// Returns a handle that stops [`Client::run`] from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Closes the transport. Idempotent.
    pub fn close(&self) {
        self.transport.close();
    }

    /// Returns the mirrored world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Tick of the last applied snapshot.
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Name of the active state, if any.
    #[must_use]
    pub fn state_name(&self) -> Option<&str> {
        self.state.as_deref().map(|state| state.name())
    }

    /// Returns true once the state machine finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("last_tick", &self.last_tick)
            .field("state", &self.state_name())
            .field("entities", &self.world.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
