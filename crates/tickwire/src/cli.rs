//! Command-line options shared by the three binaries.
//!
//! `--config` is applied first; every other flag overrides the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tickwire_networking::{ConfigError, TickwireConfig};

use crate::states::PlayingSettings;

/// Help text printed by `--help`.
pub const USAGE: &str = "\
Options:
  -c, --config <PATH>          TOML file with [server] and [client] tables
  -b, --bind <ADDR>            Server listen address (default: 127.0.0.1:7777)
      --connect <ADDR>         Server address for the client
  -t, --tick-rate <RATE>       Server ticks per second (default: 60)
      --snapshot-every <N>     Publish a snapshot every N ticks (default: 3)
  -f, --frame-rate <RATE>      Client frames per second (default: 60)
  -d, --duration <SECS>        Run for N seconds then exit
      --seed <SEED>            Seed for ball placement (default: 7)
      --balls <N>              Balls spawned when the match starts (default: 3)
      --autostart              Skip the lobby
      --start                  Client: send `start` after connecting
      --spawn <N>              Client: request N extra balls
  -h, --help                   Show this help";

/// Command-line parse failures.
#[derive(Debug, Error)]
pub enum CliError {
    /// A flag that takes a value was last on the line.
    #[error("{0} needs a value")]
    MissingValue(String),

    /// A value did not parse.
    #[error("invalid value `{value}` for {flag}")]
    InvalidValue {
        /// The flag.
        flag: String,
        /// What was given.
        value: String,
    },

    /// Not a flag we know.
    #[error("unknown option `{0}`")]
    UnknownFlag(String),

    /// The config file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything the binaries can be told.
#[derive(Clone, Debug, Default)]
pub struct CliOptions {
    /// Server and client settings, file plus overrides.
    pub config: TickwireConfig,
    /// Wall-clock limit.
    pub duration: Option<Duration>,
    /// Match settings.
    pub settings: PlayingSettings,
    /// Start playing without waiting for a `start` command.
    pub autostart: bool,
    /// Client sends `start` on connect.
    pub start: bool,
    /// Client requests this many balls on connect.
    pub spawn: u32,
    /// `--help` was given.
    pub help: bool,
}

impl CliOptions {
    /// Parses `args` (without the program name).
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] on unknown flags, missing or malformed values,
    /// or a config file that fails to load or validate.
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut options = Self::default();

        if let Some(path) = config_path(&args)? {
            options.config = TickwireConfig::load(path)?;
        }

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--config" | "-c" => {
                    args.next();
                }
                "--bind" | "-b" => options.config.server.bind_address = value(&flag, args.next())?,
                "--connect" => options.config.client.server_address = value(&flag, args.next())?,
                "--tick-rate" | "-t" => options.config.server.tick_rate = parsed(&flag, args.next())?,
                "--snapshot-every" => options.config.server.snapshot_every = parsed(&flag, args.next())?,
                "--frame-rate" | "-f" => options.config.client.frame_rate = parsed(&flag, args.next())?,
                "--duration" | "-d" => {
                    let secs: f64 = parsed(&flag, args.next())?;
                    options.duration = Some(
                        Duration::try_from_secs_f64(secs).map_err(|_| CliError::InvalidValue {
                            flag: flag.clone(),
                            value: secs.to_string(),
                        })?,
                    );
                }
                "--seed" => options.settings.seed = parsed(&flag, args.next())?,
                "--balls" => options.settings.initial_balls = parsed(&flag, args.next())?,
                "--autostart" => options.autostart = true,
                "--start" => options.start = true,
                "--spawn" => options.spawn = parsed(&flag, args.next())?,
                "--help" | "-h" => options.help = true,
                _ => return Err(CliError::UnknownFlag(flag)),
            }
        }

        options.config.validate()?;
        Ok(options)
    }
}

fn config_path(args: &[String]) -> Result<Option<PathBuf>, CliError> {
    match args.iter().position(|a| a == "--config" || a == "-c") {
        Some(at) => value(&args[at], args.get(at + 1).cloned()).map(|p| Some(PathBuf::from(p))),
        None => Ok(None),
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String, CliError> {
    next.ok_or_else(|| CliError::MissingValue(flag.to_owned()))
}

fn parsed<T: FromStr>(flag: &str, next: Option<String>) -> Result<T, CliError> {
    let raw = value(flag, next)?;
    raw.parse().map_err(|_| CliError::InvalidValue {
        flag: flag.to_owned(),
        value: raw,
    })
}
