//! # Tickwire Local
//!
//! Server and client in one process over the in-process transport, one
//! server step and one client frame per tick. No sockets involved.
//!
//! ## Usage
//!
//! ```bash
//! tickwire_local --balls 5 --duration 10
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use tickwire::build_server;
use tickwire::cli::{CliOptions, USAGE};
use tickwire::codec::ball_codec;
use tickwire::logging::init_logging;
use tickwire::render::describe;
use tickwire::states::Waiting;
use tickwire_networking::server::{StepOutcome, TickLoop};
use tickwire_networking::transport::local_pair;
use tickwire_networking::{Client, Command};
use tracing::{error, info};

fn main() -> ExitCode {
    init_logging();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("tickwire_local: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("Usage: tickwire_local [OPTIONS]\n\n{USAGE}");
        return ExitCode::SUCCESS;
    }

    let (client_transport, server_transport) = local_pair();
    let tick_rate = options.config.server.tick_rate;
    let mut server = build_server(
        options.config.server,
        server_transport,
        options.settings,
        options.autostart,
    );
    let mut client = Client::new(Arc::new(ball_codec()), client_transport);
    client.set_state(Waiting::new(u64::from(tick_rate)));

    // Lobby needs a nudge unless we skipped it.
    if !options.autostart {
        client.send_command(Command::empty("start"));
    }
    for _ in 0..options.spawn {
        client.send_command(Command::empty("spawn_ball"));
    }

    let print_every = u64::from(tick_rate).max(1);
    let mut tick_loop = TickLoop::new(tick_rate);
    let started = Instant::now();

    'outer: loop {
        if options.duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        tick_loop.wait_for_next_tick();
        while tick_loop.should_tick() {
            let tick_start = tick_loop.begin_tick();
            let outcome = match server.step() {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "simulation failed");
                    return ExitCode::FAILURE;
                }
            };
            client.frame();
            tick_loop.end_tick(tick_start);

            if server.tick() % print_every == 0 {
                println!("{}", describe(client.world()));
            }
            if outcome == StepOutcome::Finished {
                break 'outer;
            }
        }
    }

    let stats = tick_loop.stats();
    info!(
        ticks = server.tick(),
        snapshots = server.snapshots_published(),
        client_tick = ?client.last_tick(),
        avg_us = stats.avg_tick_us,
        late = stats.late_ticks,
        "local run finished"
    );
    ExitCode::SUCCESS
}
