//! # Simulation Server
//!
//! Authoritative fixed-tick simulation.
//!
//! ## Tick Order
//!
//! ```text
//! step():
//!   1. drain queued commands -> active state's process_command (in order)
//!   2. run every system, in registration order
//!   3. tick += 1
//!   4. every `snapshot_every` ticks: encode world -> publish snapshot
//!   5. active state's tick -> Stay | Switch(next) | Finish
//! ```
//!
//! [`Server::step`] runs exactly one tick and is what tests and lock-step
//! hosts drive. [`Server::run`] paces `step` at the configured rate until the
//! state machine finishes or someone calls [`StopHandle::stop`].

mod commands;
mod state;
mod tick;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tickwire_core::{run_system, System, World};
use tracing::{debug, info, trace, warn};

pub use commands::CommandRouter;
pub use state::{SimulationState, Transition};
pub use tick::{TickLoop, TickStats, MAX_CATCH_UP_TICKS};

use crate::codec::SnapshotCodec;
use crate::config::ServerConfig;
use crate::error::{SimulationError, SimulationResult};
use crate::protocol::Command;
use crate::stop::StopHandle;
use crate::transport::ServerTransport;

/// How often (in ticks) `run` logs timing statistics.
const STATS_LOG_INTERVAL: u64 = 600;

/// Whether the loop should keep going after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep stepping.
    Continue,
    /// The state machine finished.
    Finished,
}

/// The authoritative simulation.
///
/// Owns the world, the systems, the active state, a codec, and the server
/// side of a transport.
pub struct Server {
    config: ServerConfig,
    world: World,
    systems: Vec<Box<dyn System>>,
    state: Option<Box<dyn SimulationState>>,
    codec: Arc<dyn SnapshotCodec>,
    transport: Box<dyn ServerTransport>,
    tick: u64,
    snapshots_published: u64,
    /// Reused every tick to avoid reallocating.
    inbox: Vec<Command>,
    stop: StopHandle,
}

impl Server {
    /// Creates a server with an empty world and no state.
    ///
    /// Install a state with [`Server::set_state`] before stepping.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        codec: Arc<dyn SnapshotCodec>,
        transport: impl ServerTransport + 'static,
    ) -> Self {
        Self {
            config,
            world: World::new(),
            systems: Vec::new(),
            state: None,
            codec,
            transport: Box::new(transport),
            tick: 0,
            snapshots_published: 0,
            inbox: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    /// Replaces the world (builder style).
    #[must_use]
    pub fn with_world(mut self, world: World) -> Self {
        self.world = world;
        self
    }

    /// Appends a system. Systems run in the order they were added.
    pub fn add_system(&mut self, system: impl System + 'static) -> &mut Self {
        debug!(system = system.name(), "system registered");
        self.systems.push(Box::new(system));
        self
    }

    /// Installs the active state, replacing any current one.
    pub fn set_state(&mut self, state: impl SimulationState + 'static) -> &mut Self {
        self.set_boxed_state(Box::new(state))
    }

    /// Installs an already boxed state.
    pub fn set_boxed_state(&mut self, state: Box<dyn SimulationState>) -> &mut Self {
        info!(state = state.name(), tick = self.tick, "simulation state installed");
        self.state = Some(state);
        self
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::NoActiveState`] if no state is installed (also
    ///   after the state machine finished)
    /// - [`SimulationError::System`] if a system fails; the tick counter is
    ///   not advanced and no snapshot is published
    pub fn step(&mut self) -> SimulationResult<StepOutcome> {
        let Some(state) = self.state.as_mut() else {
            return Err(SimulationError::NoActiveState);
        };

        self.transport.drain_commands(&mut self.inbox);
        for command in self.inbox.drain(..) {
            let origin = command.origin;
            if let Err(e) = state.process_command(&mut self.world, command) {
                warn!(tick = self.tick, state = state.name(), ?origin, error = %e, "command rejected");
            }
        }

        let dt = self.config.tick_duration().as_secs_f32();
        for system in &mut self.systems {
            if let Err(source) = run_system(system.as_mut(), &mut self.world, dt) {
                return Err(SimulationError::System {
                    system: system.name().to_owned(),
                    tick: self.tick + 1,
                    source,
                });
            }
        }

        self.tick += 1;

        if self.tick % u64::from(self.config.snapshot_every.max(1)) == 0 {
            let snapshot = self.codec.encode(self.tick, &self.world);
            trace!(tick = self.tick, entities = snapshot.len(), "publishing snapshot");
            self.transport.publish_snapshot(&snapshot);
            self.snapshots_published += 1;
        }

        match state.tick(&mut self.world, self.tick) {
            Transition::Stay => {}
            Transition::Switch(next) => {
                info!(tick = self.tick, from = state.name(), to = next.name(), "simulation state switched");
                *state = next;
            }
            Transition::Finish => {
                info!(tick = self.tick, state = state.name(), "simulation finished");
                self.state = None;
                return Ok(StepOutcome::Finished);
            }
        }

        if self.state.as_ref().is_some_and(|state| state.done()) {
            info!(tick = self.tick, "simulation state reports done");
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Continue)
    }

    /// Steps at the configured tick rate until the state machine finishes,
    /// a system fails, or [`Server::stop`] is called. Blocks the caller.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop.
    pub fn run(&mut self) -> SimulationResult<()> {
        let mut tick_loop = TickLoop::new(self.config.tick_rate);
        let started = Instant::now();
        info!(
            tick_rate = self.config.tick_rate,
            snapshot_every = self.config.snapshot_every,
            "simulation loop started"
        );

        let result = 'run: loop {
            if self.stop.is_stopped() {
                info!(tick = self.tick, "stop requested");
                break Ok(());
            }
            tick_loop.wait_for_next_tick();

            let mut caught_up = 0;
            while tick_loop.should_tick() {
                if caught_up == MAX_CATCH_UP_TICKS {
                    tick_loop.discard_backlog();
                    warn!(tick = self.tick, "simulation falling behind, skipping ticks");
                    break;
                }
                let start = tick_loop.begin_tick();
                let outcome = self.step();
                tick_loop.end_tick(start);
                caught_up += 1;

                match outcome {
                    Ok(StepOutcome::Continue) => {}
                    Ok(StepOutcome::Finished) => break 'run Ok(()),
                    Err(e) => break 'run Err(e),
                }
                if tick_loop.tick_count() % STATS_LOG_INTERVAL == 0 {
                    log_stats(tick_loop.stats(), self.transport.client_count());
                    tick_loop.reset_stats();
                }
            }
        };

        let stats = tick_loop.stats();
        info!(
            tick = self.tick,
            snapshots = self.snapshots_published,
            avg_us = stats.avg_tick_us,
            max_us = stats.max_tick_us,
            late = stats.late_ticks,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "simulation loop exited"
        );
        result
    }

    /// Moves the server onto its own thread and starts [`Server::run`].
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be spawned.
    pub fn spawn(mut self) -> std::io::Result<RunningServer> {
        let stop = self.stop.clone();
        let thread = thread::Builder::new()
            .name("tickwire-simulation".into())
            .spawn(move || {
                let result = self.run();
                if let Err(e) = &result {
                    warn!(error = %e, "simulation stopped with an error");
                }
                (self, result)
            })?;
        Ok(RunningServer { stop, thread })
    }

    /// Asks [`Server::run`] to exit before its next tick. Idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Returns a handle that stops this server from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns the authoritative world mutably (for seeding between ticks).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of snapshots published so far.
    #[must_use]
    pub fn snapshots_published(&self) -> u64 {
        self.snapshots_published
    }

    /// Name of the active state, if any.
    #[must_use]
    pub fn state_name(&self) -> Option<&str> {
        self.state.as_deref().map(|state| state.name())
    }

    /// Returns the server's configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the server side of the transport.
    #[must_use]
    pub fn transport(&self) -> &dyn ServerTransport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("tick", &self.tick)
            .field("state", &self.state_name())
            .field("entities", &self.world.len())
            .field("systems", &self.systems.len())
            .field("snapshots_published", &self.snapshots_published)
            .finish_non_exhaustive()
    }
}

fn log_stats(stats: &TickStats, clients: usize) {
    debug!(
        avg_us = stats.avg_tick_us,
        min_us = stats.min_tick_us,
        max_us = stats.max_tick_us,
        late = stats.late_ticks,
        skipped = stats.skipped_ticks,
        clients,
        "tick stats"
    );
}

/// A server running on its own thread.
#[derive(Debug)]
pub struct RunningServer {
    stop: StopHandle,
    thread: JoinHandle<(Server, SimulationResult<()>)>,
}

impl RunningServer {
    /// Returns a handle that stops the loop.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns true once the loop has exited on its own or been stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stops the loop, waits for it, and hands the server back.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop, or
    /// [`SimulationError::Panicked`].
    pub fn stop(self) -> SimulationResult<Server> {
        self.stop.stop();
        self.join()
    }

    /// Waits for the loop to exit on its own and hands the server back.
    ///
    /// # Errors
    ///
    /// Same as [`RunningServer::stop`].
    pub fn join(self) -> SimulationResult<Server> {
        let (server, result) = self.thread.join().map_err(|_| SimulationError::Panicked)?;
        result?;
        server.stop.reset();
        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ComponentCodec;
    use crate::transport::local_pair;

    struct Forever;

    impl SimulationState for Forever {
        fn tick(&mut self, _world: &mut World, _tick: u64) -> Transition {
            Transition::Stay
        }
    }

    fn server() -> Server {
        let (_client, transport) = local_pair();
        Server::new(
            ServerConfig::default(),
            Arc::new(ComponentCodec::builder().build()),
            transport,
        )
    }

    #[test]
    fn test_step_without_state_fails() {
        let mut server = server();
        assert!(matches!(server.step(), Err(SimulationError::NoActiveState)));
        assert_eq!(server.tick(), 0);
    }

    #[test]
    fn test_default_state_rejects_commands_without_stopping() {
        let (client, transport) = local_pair();
        let mut server = Server::new(
            ServerConfig::default(),
            Arc::new(ComponentCodec::builder().build()),
            transport,
        );
        server.set_state(Forever);

        crate::transport::ClientTransport::send_command(&client, Command::empty("anything"));
        assert_eq!(server.step().unwrap(), StepOutcome::Continue);
        assert_eq!(server.tick(), 1);
        assert!(server.state_name().is_some_and(|name| name.ends_with("Forever")));
    }

    #[test]
    fn test_stop_before_run_returns_immediately() {
        let mut server = server();
        server.set_state(Forever);
        server.stop();
        server.run().unwrap();
        assert_eq!(server.tick(), 0);
    }
}
