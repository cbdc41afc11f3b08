//! A threaded server and a client talking over loopback TCP.

mod support;

use std::sync::Arc;

use serde_json::json;
use support::{wait_until, Counter, NET_TIMEOUT};
use tickwire_core::{ComponentKey, Entity, System, SystemResult, World};
use tickwire_networking::codec::ComponentCodec;
use tickwire_networking::error::CommandError;
use tickwire_networking::protocol::{Command, Snapshot};
use tickwire_networking::server::{CommandRouter, Server, SimulationState, Transition};
use tickwire_networking::transport::{TcpClientTransport, TcpServerTransport};
use tickwire_networking::{Client, ClientState, ClientTransition, FrameOutcome, ServerConfig};

#[derive(serde::Deserialize)]
struct Spawn {
    id: String,
}

struct Open {
    router: Arc<CommandRouter<Open>>,
}

impl Open {
    fn new() -> Self {
        let router = CommandRouter::<Open>::new().on_payload(
            "spawn",
            |_state: &mut Open, world: &mut World, spawn: Spawn| {
                world.insert(Entity::new(spawn.id, "counter").with(Counter(0)));
                Ok(())
            },
        );
        Self {
            router: Arc::new(router),
        }
    }
}

impl SimulationState for Open {
    fn process_command(&mut self, world: &mut World, command: Command) -> Result<(), CommandError> {
        let router = Arc::clone(&self.router);
        router.dispatch(self, world, &command)
    }

    fn tick(&mut self, _world: &mut World, _tick: u64) -> Transition {
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

/// Finishes once the counter it watches reaches `target`.
struct WatchUntil {
    id: &'static str,
    target: u64,
}

impl ClientState for WatchUntil {
    fn update(&mut self, world: &World, _snapshot: &Snapshot) -> ClientTransition {
        match world.get(self.id).and_then(|e| e.get::<Counter>()) {
            Some(counter) if counter.0 >= self.target => ClientTransition::Finish,
            _ => ClientTransition::Stay,
        }
    }
}

#[test]
fn test_client_mirrors_server_over_tcp() {
    let codec = Arc::new(ComponentCodec::builder().visible::<Counter>().build());
    let transport = TcpServerTransport::bind("127.0.0.1:0").expect("bind");
    let addr = transport.local_addr();

    let config = ServerConfig {
        tick_rate: 200,
        snapshot_every: 2,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, codec.clone(), transport);
    server.set_state(Open::new());
    server.add_system(Increment);
    let running = server.spawn().expect("spawn");

    let mut client = Client::new(codec, TcpClientTransport::connect(addr).expect("connect"));
    client.set_state(WatchUntil { id: "ball", target: 10 });
    client.send_command(Command::new("spawn", json!({ "id": "ball" })));

    assert!(wait_until(NET_TIMEOUT, || client.frame() == FrameOutcome::Finished));
    assert!(client.last_tick().is_some_and(|tick| tick % 2 == 0));
    assert!(client.world().get("ball").is_some_and(|e| e.blueprint() == "counter"));

    client.close();
    let server = running.stop().expect("clean stop");
    server.transport().close();
    assert_eq!(server.transport().client_count(), 0);
}
