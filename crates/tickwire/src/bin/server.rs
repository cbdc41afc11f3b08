//! # Tickwire Server
//!
//! Headless bouncing-balls server over TCP.
//!
//! ## Usage
//!
//! ```bash
//! tickwire_server --bind 0.0.0.0:7777 --tick-rate 60 --duration 30
//! ```

use std::process::ExitCode;
use std::thread;

use tickwire::cli::{CliOptions, USAGE};
use tickwire::logging::init_logging;
use tickwire::build_server;
use tickwire_networking::transport::TcpServerTransport;
use tickwire_networking::ServerTransport;
use tracing::{error, info};

fn main() -> ExitCode {
    init_logging();

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("tickwire_server: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("Usage: tickwire_server [OPTIONS]\n\n{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = options.config.server;
    let transport = match TcpServerTransport::bind(config.bind_address.as_str()) {
        Ok(transport) => transport,
        Err(e) => {
            error!(address = %config.bind_address, error = %e, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    info!(
        address = %transport.local_addr(),
        tick_rate = config.tick_rate,
        snapshot_every = config.snapshot_every,
        autostart = options.autostart,
        duration = ?options.duration,
        "server listening"
    );

    let server = build_server(config, transport, options.settings, options.autostart);
    let running = match server.spawn() {
        Ok(running) => running,
        Err(e) => {
            error!(error = %e, "could not start the simulation thread");
            return ExitCode::FAILURE;
        }
    };

    let result = match options.duration {
        Some(duration) => {
            thread::sleep(duration);
            running.stop()
        }
        None => running.join(),
    };

    match result {
        Ok(server) => {
            ServerTransport::close(server.transport());
            info!(tick = server.tick(), snapshots = server.snapshots_published(), "server shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
