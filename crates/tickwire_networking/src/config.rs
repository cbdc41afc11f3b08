//! # Configuration
//!
//! TOML-backed settings for the server and client loops. Every field has a
//! default, so an empty file (or no file) is valid.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:7777"
//! tick_rate = 60
//! snapshot_every = 3
//!
//! [client]
//! server_address = "127.0.0.1:7777"
//! frame_rate = 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{DEFAULT_ADDRESS, DEFAULT_FRAME_RATE, DEFAULT_SNAPSHOT_EVERY, DEFAULT_TICK_RATE};

/// Highest accepted tick or frame rate.
pub const MAX_RATE: u32 = 1000;

/// Server loop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_address: String,
    /// Ticks per second.
    pub tick_rate: u32,
    /// Publish a snapshot every this many ticks.
    pub snapshot_every: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_ADDRESS.to_owned(),
            tick_rate: DEFAULT_TICK_RATE,
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
        }
    }
}

impl ServerConfig {
    /// Wall-clock length of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_address is empty".into()));
        }
        check_rate("server.tick_rate", self.tick_rate)?;
        if self.snapshot_every == 0 {
            return Err(ConfigError::Invalid("server.snapshot_every must be at least 1".into()));
        }
        Ok(())
    }
}

/// Client loop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Address of the server to connect to.
    pub server_address: String,
    /// Frames per second.
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_ADDRESS.to_owned(),
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl ClientConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_address.trim().is_empty() {
            return Err(ConfigError::Invalid("client.server_address is empty".into()));
        }
        check_rate("client.frame_rate", self.frame_rate)
    }
}

fn check_rate(field: &str, rate: u32) -> Result<(), ConfigError> {
    if rate == 0 || rate > MAX_RATE {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between 1 and {MAX_RATE}, got {rate}"
        )));
    }
    Ok(())
}

/// Complete configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TickwireConfig {
    /// `[server]` table.
    pub server: ServerConfig,
    /// `[client]` table.
    pub client: ClientConfig,
}

impl TickwireConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validates both tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.client.validate()
    }
}
