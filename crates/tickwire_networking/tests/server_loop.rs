//! Server stepping, state transitions, and the threaded run loop.

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use support::Counter;
use tickwire_core::{ComponentKey, Entity, System, SystemError, SystemResult, World};
use tickwire_networking::codec::ComponentCodec;
use tickwire_networking::error::CommandError;
use tickwire_networking::protocol::Command;
use tickwire_networking::server::{Server, SimulationState, StepOutcome, Transition};
use tickwire_networking::transport::{local_pair, ClientTransport, LocalClientTransport};
use tickwire_networking::{ServerConfig, SimulationError};

type Log = Arc<Mutex<Vec<String>>>;

fn codec() -> Arc<ComponentCodec> {
    Arc::new(ComponentCodec::builder().visible::<Counter>().build())
}

fn server_with(snapshot_every: u32) -> (Server, LocalClientTransport) {
    let (client, transport) = local_pair();
    let config = ServerConfig {
        tick_rate: 1000,
        snapshot_every,
        ..ServerConfig::default()
    };
    (Server::new(config, codec(), transport), client)
}

/// Records every command it sees under `label`; switches to `next` at `switch_at`.
struct Recording {
    label: &'static str,
    log: Log,
    switch_at: Option<u64>,
    next: Option<Box<dyn SimulationState>>,
}

impl Recording {
    fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            switch_at: None,
            next: None,
        }
    }

    fn then(mut self, at: u64, next: impl SimulationState + 'static) -> Self {
        self.switch_at = Some(at);
        self.next = Some(Box::new(next));
        self
    }
}

impl SimulationState for Recording {
    fn name(&self) -> &str {
        self.label
    }

    fn process_command(&mut self, world: &mut World, command: Command) -> Result<(), CommandError> {
        self.log.lock().push(format!("{}:{}", self.label, command.kind));
        match command.kind.as_str() {
            "add" => {
                let id = format!("c-{}", world.len());
                world.insert(Entity::new(id, "counter").with(Counter(0)));
                Ok(())
            }
            "bad" => Err(CommandError::Rejected {
                kind: command.kind,
                reason: "bad on purpose".into(),
            }),
            _ => Ok(()),
        }
    }

    fn tick(&mut self, _world: &mut World, tick: u64) -> Transition {
        if self.switch_at == Some(tick) {
            if let Some(next) = self.next.take() {
                return Transition::Switch(next);
            }
        }
        Transition::Stay
    }
}

struct Increment;

impl System for Increment {
    fn name(&self) -> &str {
        "increment"
    }

    fn required(&self) -> &[ComponentKey] {
        const REQUIRED: &[ComponentKey] = &[ComponentKey::of::<Counter>()];
        REQUIRED
    }

    fn update_entity(&mut self, entity: &mut Entity, _dt: f32) -> SystemResult<()> {
        if let Some(counter) = entity.get_mut::<Counter>() {
            counter.0 += 1;
        }
        Ok(())
    }
}

struct Exploding;

impl System for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn required(&self) -> &[ComponentKey] {
        &[]
    }

    fn update(&mut self, _world: &mut World, _dt: f32) -> SystemResult<()> {
        Err(SystemError::InvalidState("boom".into()))
    }
}

struct FinishAt(u64);

impl SimulationState for FinishAt {
    fn tick(&mut self, _world: &mut World, tick: u64) -> Transition {
        if tick >= self.0 {
            Transition::Finish
        } else {
            Transition::Stay
        }
    }
}

#[test]
fn test_snapshot_cadence() {
    let (mut server, client) = server_with(4);
    let log = Log::default();
    server.set_state(Recording::new("only", &log));

    for _ in 0..7 {
        server.step().unwrap();
    }
    assert_eq!(server.snapshots_published(), 1);
    assert_eq!(client.receive_snapshot().map(|s| s.tick), Some(4));

    server.step().unwrap();
    assert_eq!(server.snapshots_published(), 2);
    assert_eq!(client.receive_snapshot().map(|s| s.tick), Some(8));
}

#[test]
fn test_commands_apply_before_systems() {
    let (mut server, client) = server_with(1);
    let log = Log::default();
    server.set_state(Recording::new("only", &log));
    server.add_system(Increment);

    client.send_command(Command::empty("add"));
    server.step().unwrap();

    // Created by the command, then incremented in the same tick.
    let counter = server.world().get("c-0").and_then(|e| e.get::<Counter>()).cloned();
    assert_eq!(counter, Some(Counter(1)));

    let snapshot = client.receive_snapshot().expect("snapshot every tick");
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.entity("c-0").map(|e| e.components["counter"].clone()), Some(1.into()));
}

#[test]
fn test_switch_routes_next_commands_to_new_state() {
    let (mut server, client) = server_with(10);
    let log = Log::default();
    let second = Recording::new("second", &log);
    server.set_state(Recording::new("first", &log).then(2, second));

    client.send_command(Command::empty("one"));
    server.step().unwrap();
    client.send_command(Command::empty("two"));
    server.step().unwrap();
    assert_eq!(server.state_name(), Some("second"));

    client.send_command(Command::empty("three"));
    server.step().unwrap();

    assert_eq!(*log.lock(), vec!["first:one", "first:two", "second:three"]);
}

#[test]
fn test_rejected_command_does_not_stop_the_tick() {
    let (mut server, client) = server_with(10);
    let log = Log::default();
    server.set_state(Recording::new("only", &log));

    client.send_command(Command::empty("bad"));
    client.send_command(Command::empty("add"));
    assert_eq!(server.step().unwrap(), StepOutcome::Continue);

    assert_eq!(log.lock().len(), 2);
    assert!(server.world().contains("c-0"));
}

#[test]
fn test_system_error_aborts_tick() {
    let (mut server, client) = server_with(1);
    server.set_state(FinishAt(100));
    server.add_system(Exploding);

    let result = server.step();
    assert!(matches!(
        result,
        Err(SimulationError::System { ref system, tick: 1, .. }) if system == "exploding"
    ));
    assert_eq!(server.tick(), 0);
    assert_eq!(server.snapshots_published(), 0);
    assert!(client.receive_snapshot().is_none());
}

#[test]
fn test_finish_stops_and_later_steps_fail() {
    let (mut server, _client) = server_with(1);
    server.set_state(FinishAt(2));

    assert_eq!(server.step().unwrap(), StepOutcome::Continue);
    assert_eq!(server.step().unwrap(), StepOutcome::Finished);
    assert_eq!(server.state_name(), None);
    assert!(matches!(server.step(), Err(SimulationError::NoActiveState)));
}

#[test]
fn test_run_exits_when_state_finishes() {
    let (mut server, _client) = server_with(5);
    server.set_state(FinishAt(20));
    server.run().unwrap();
    assert_eq!(server.tick(), 20);
    assert_eq!(server.snapshots_published(), 4);
}

#[test]
fn test_spawned_server_stops_on_request() {
    let (mut server, client) = server_with(1);
    server.set_state(FinishAt(u64::MAX));
    server.add_system(Increment);
    server.world_mut().insert(Entity::new("c-0", "counter").with(Counter(0)));

    let running = server.spawn().expect("spawn");
    assert!(support::wait_until(Duration::from_secs(5), || client
        .receive_snapshot()
        .is_some_and(|s| s.tick >= 10)));
    let server = running.stop().expect("clean stop");

    let ticks = server.tick();
    assert!(ticks >= 10);
    let counter = server.world().get("c-0").and_then(|e| e.get::<Counter>()).cloned();
    assert_eq!(counter, Some(Counter(ticks)));
}
