//! # Simulation States
//!
//! The server's behaviour is a state machine: exactly one state is active,
//! it receives every command, and after each tick it decides whether to
//! stay, hand over to another state, or finish.

use tickwire_core::World;

use crate::error::CommandError;
use crate::protocol::Command;

/// What the active state wants after a tick.
pub enum Transition {
    /// Keep the current state.
    Stay,
    /// Replace the current state. The new one sees the next tick's commands.
    Switch(Box<dyn SimulationState>),
    /// The state machine is done; the server loop stops.
    Finish,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stay => f.write_str("Stay"),
            Self::Switch(next) => f.debug_tuple("Switch").field(&next.name()).finish(),
            Self::Finish => f.write_str("Finish"),
        }
    }
}

/// One mode of the simulation (lobby, match in progress, ...).
///
/// # Example
///
/// ```rust
/// use tickwire_core::World;
/// use tickwire_networking::error::CommandError;
/// use tickwire_networking::protocol::Command;
/// use tickwire_networking::server::{SimulationState, Transition};
///
/// /// Runs for a fixed number of ticks, counting `ping`s.
/// struct Countdown {
///     remaining: u32,
///     pings: u32,
/// }
///
/// impl SimulationState for Countdown {
///     fn process_command(&mut self, _world: &mut World, command: Command) -> Result<(), CommandError> {
///         match command.kind.as_str() {
///             "ping" => {
///                 self.pings += 1;
///                 Ok(())
///             }
///             _ => Err(CommandError::UnknownCommand(command.kind)),
///         }
///     }
///
///     fn tick(&mut self, _world: &mut World, _tick: u64) -> Transition {
///         self.remaining = self.remaining.saturating_sub(1);
///         if self.remaining == 0 { Transition::Finish } else { Transition::Stay }
///     }
/// }
/// ```
pub trait SimulationState: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Applies one command. Called for every queued command before the
    /// tick's systems run.
    ///
    /// # Errors
    ///
    /// Any error is logged by the server and the next command is processed.
    fn process_command(&mut self, world: &mut World, command: Command) -> Result<(), CommandError> {
        let _ = world;
        Err(CommandError::UnknownCommand(command.kind))
    }

    /// Called once per tick, after systems ran and the tick counter moved
    /// to `tick`.
    fn tick(&mut self, world: &mut World, tick: u64) -> Transition;

    /// Returns true once this state considers the simulation finished.
    fn done(&self) -> bool {
        false
    }
}
