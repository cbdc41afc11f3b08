//! # Demo States
//!
//! Server: `Lobby` until someone sends `start`, then `Playing` until a
//! `stop` command or the tick budget runs out.
//!
//! Client: `Waiting` until the first snapshot, then `Watching`.
//!
//! ## Commands (while playing)
//!
//! | kind         | payload                                   |
//! |--------------|-------------------------------------------|
//! | `spawn_ball` | `null` or `{x?, y?, color?}`              |
//! | `paint`      | `{id, color}`                             |
//! | `remove`     | `{id}`                                    |
//! | `stop`       | none                                      |

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tickwire_core::{BlueprintRegistry, Entity, World};
use tickwire_networking::error::CommandError;
use tickwire_networking::protocol::{Command, Snapshot};
use tickwire_networking::server::{CommandRouter, SimulationState, Transition};
use tickwire_networking::{ClientState, ClientTransition};
use tracing::{debug, info};

use crate::codec::{ball_blueprints, BALL};
use crate::components::{Arena, Color, Position, Velocity};

/// Largest speed component given to a random ball.
const MAX_SPEED: f32 = 30.0;

/// Knobs for a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayingSettings {
    /// Seed for ball placement and colours.
    pub seed: u64,
    /// Balls spawned on the first playing tick.
    pub initial_balls: u32,
    /// Ticks after which the match ends on its own.
    pub tick_budget: Option<u64>,
    /// Play field.
    pub arena: Arena,
}

impl Default for PlayingSettings {
    fn default() -> Self {
        Self {
            seed: 7,
            initial_balls: 3,
            tick_budget: None,
            arena: Arena::default(),
        }
    }
}

/// Waits for a `start` command.
#[derive(Debug)]
pub struct Lobby {
    settings: PlayingSettings,
    started: bool,
}

impl Lobby {
    /// Creates a lobby that starts a match with `settings`.
    #[must_use]
    pub fn new(settings: PlayingSettings) -> Self {
        Self {
            settings,
            started: false,
        }
    }
}

impl SimulationState for Lobby {
    fn name(&self) -> &str {
        "lobby"
    }

    fn process_command(&mut self, _world: &mut World, command: Command) -> Result<(), CommandError> {
        match command.kind.as_str() {
            "start" => {
                info!(origin = ?command.origin, "start requested");
                self.started = true;
                Ok(())
            }
            _ => Err(CommandError::Rejected {
                kind: command.kind,
                reason: "the match has not started".into(),
            }),
        }
    }

    fn tick(&mut self, _world: &mut World, _tick: u64) -> Transition {
        if self.started {
            Transition::Switch(Box::new(Playing::new(self.settings.clone())))
        } else {
            Transition::Stay
        }
    }
}

/// `spawn_ball` payload. Missing fields are randomized.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpawnBall {
    /// Horizontal position.
    #[serde(default)]
    pub x: Option<f32>,
    /// Vertical position.
    #[serde(default)]
    pub y: Option<f32>,
    /// Paint colour.
    #[serde(default)]
    pub color: Option<Color>,
}

/// `paint` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Paint {
    /// Ball to paint.
    pub id: String,
    /// New colour.
    pub color: Color,
}

/// `remove` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Remove {
    /// Ball to remove.
    pub id: String,
}

/// A match in progress.
#[derive(Debug)]
pub struct Playing {
    settings: PlayingSettings,
    blueprints: BlueprintRegistry,
    rng: ChaCha8Rng,
    next_ball: u64,
    started_at: Option<u64>,
    stop_requested: bool,
    router: Arc<CommandRouter<Playing>>,
}

fn playing_router() -> CommandRouter<Playing> {
    CommandRouter::new()
        .on_payload("spawn_ball", |playing: &mut Playing, world: &mut World, request: Option<SpawnBall>| {
            let id = playing.spawn(world, &request.unwrap_or_default());
            debug!(%id, "ball spawned on request");
            Ok(())
        })
        .on_payload("paint", |_playing: &mut Playing, world: &mut World, paint: Paint| {
            let ball = world.get_mut(&paint.id).ok_or_else(|| CommandError::Rejected {
                kind: "paint".into(),
                reason: format!("no ball `{}`", paint.id),
            })?;
            ball.insert(paint.color);
            Ok(())
        })
        .on_payload("remove", |_playing: &mut Playing, world: &mut World, remove: Remove| {
            world.despawn(&remove.id).map(drop).ok_or_else(|| CommandError::Rejected {
                kind: "remove".into(),
                reason: format!("no ball `{}`", remove.id),
            })
        })
        .on("stop", |playing: &mut Playing, _world: &mut World, command: &Command| {
            info!(origin = ?command.origin, "stop requested");
            playing.stop_requested = true;
            Ok(())
        })
}

impl Playing {
    /// Creates a match. Balls are spawned on its first tick.
    #[must_use]
    pub fn new(settings: PlayingSettings) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        Self {
            settings,
            blueprints: ball_blueprints(),
            rng,
            next_ball: 0,
            started_at: None,
            stop_requested: false,
            router: Arc::new(playing_router()),
        }
    }

    /// Spawns one ball, filling unspecified fields from the seeded RNG.
    ///
    /// Returns the new ball's identity (`ball-<n>`).
    pub fn spawn(&mut self, world: &mut World, request: &SpawnBall) -> String {
        let id = format!("ball-{}", self.next_ball);
        self.next_ball += 1;

        let arena = self.settings.arena;
        let x = request.x.unwrap_or_else(|| self.rng.gen_range(0.0..arena.width));
        let y = request.y.unwrap_or_else(|| self.rng.gen_range(0.0..arena.height));
        let velocity = Velocity {
            x: self.rng.gen_range(-MAX_SPEED..MAX_SPEED),
            y: self.rng.gen_range(-MAX_SPEED..MAX_SPEED),
        };
        let color = request
            .color
            .unwrap_or_else(|| Color::PALETTE[self.rng.gen_range(0..Color::PALETTE.len())]);

        let mut ball = self
            .blueprints
            .build(BALL, id.as_str().into())
            .unwrap_or_else(|_| Entity::new(id.as_str(), BALL));
        ball.insert(Position { x, y });
        ball.insert(velocity);
        ball.insert(color);
        world.insert(ball);
        id
    }

    /// Balls spawned so far.
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.next_ball
    }
}

impl SimulationState for Playing {
    fn name(&self) -> &str {
        "playing"
    }

    fn process_command(&mut self, world: &mut World, command: Command) -> Result<(), CommandError> {
        let router = Arc::clone(&self.router);
        router.dispatch(self, world, &command)
    }

    fn tick(&mut self, world: &mut World, tick: u64) -> Transition {
        let started_at = if let Some(started_at) = self.started_at {
            started_at
        } else {
            for _ in 0..self.settings.initial_balls {
                self.spawn(world, &SpawnBall::default());
            }
            info!(tick, balls = world.len(), "match started");
            self.started_at = Some(tick);
            tick
        };

        if self.stop_requested {
            info!(tick, "match stopped");
            return Transition::Finish;
        }
        if self
            .settings
            .tick_budget
            .is_some_and(|budget| tick - started_at >= budget)
        {
            info!(tick, "tick budget spent");
            return Transition::Finish;
        }
        Transition::Stay
    }
}

/// Client state before the first snapshot.
#[derive(Debug)]
pub struct Waiting {
    log_every: u64,
}

impl Waiting {
    /// `log_every`: how many snapshots between `Watching` status lines.
    #[must_use]
    pub fn new(log_every: u64) -> Self {
        Self { log_every }
    }
}

impl ClientState for Waiting {
    fn name(&self) -> &str {
        "waiting"
    }

    fn update(&mut self, world: &World, snapshot: &Snapshot) -> ClientTransition {
        info!(tick = snapshot.tick, balls = world.len(), "first snapshot received");
        ClientTransition::Switch(Box::new(Watching::new(self.log_every)))
    }
}

/// Client state while snapshots flow.
#[derive(Debug)]
pub struct Watching {
    snapshots: u64,
    log_every: u64,
}

impl Watching {
    /// Creates the state.
    #[must_use]
    pub fn new(log_every: u64) -> Self {
        Self {
            snapshots: 0,
            log_every: log_every.max(1),
        }
    }

    /// Snapshots seen in this state.
    #[must_use]
    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }
}

impl ClientState for Watching {
    fn name(&self) -> &str {
        "watching"
    }

    fn update(&mut self, world: &World, snapshot: &Snapshot) -> ClientTransition {
        self.snapshots += 1;
        if self.snapshots % self.log_every == 0 {
            info!(tick = snapshot.tick, balls = world.len(), snapshots = self.snapshots, "watching");
        }
        ClientTransition::Stay
    }
}
