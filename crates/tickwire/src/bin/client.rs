//! # Tickwire Client
//!
//! Connects to a server and prints the arena every half second.
//!
//! ## Usage
//!
//! ```bash
//! tickwire_client --connect 127.0.0.1:7777 --start --spawn 2
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use tickwire::cli::{CliOptions, USAGE};
use tickwire::codec::ball_codec;
use tickwire::logging::init_logging;
use tickwire::render::describe;
use tickwire::states::Waiting;
use tickwire_networking::transport::TcpClientTransport;
use tickwire_networking::{Client, Command, ConnectionState};
use tracing::{error, info};

/// Status lines from `Watching`, in snapshots.
const LOG_EVERY: u64 = 20;

fn main() -> ExitCode {
    init_logging();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("tickwire_client: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("Usage: tickwire_client [OPTIONS]\n\n{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = options.config.client;
    let transport = match TcpClientTransport::connect(config.server_address.as_str()) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            error!(address = %config.server_address, error = %e, "connect failed");
            return ExitCode::FAILURE;
        }
    };
    info!(server = %transport.peer_addr(), frame_rate = config.frame_rate, "connected");

    let mut client = Client::new(Arc::new(ball_codec()), Arc::clone(&transport));
    client.set_state(Waiting::new(LOG_EVERY));

    if options.start {
        client.send_command(Command::empty("start"));
    }
    for _ in 0..options.spawn {
        client.send_command(Command::empty("spawn_ball"));
    }

    if let Some(duration) = options.duration {
        let stop = client.stop_handle();
        thread::spawn(move || {
            thread::sleep(duration);
            stop.stop();
        });
    }

    let print_every = u64::from(config.frame_rate / 2).max(1);
    let stop = client.stop_handle();
    let mut frame = 0u64;
    let frames = client.run(config.frame_rate, |world| {
        frame += 1;
        if frame % print_every == 0 && !world.is_empty() {
            println!("{}", describe(world));
        }
        if transport.state() != ConnectionState::Open {
            info!("server went away");
            stop.stop();
        }
    });

    client.close();
    info!(frames, last_tick = ?client.last_tick(), "client shut down");
    ExitCode::SUCCESS
}
