//! Configuration for the fleet sync server.
//!
//! Defaults can be overridden either from environment variables or from a
//! TOML file (same field names, every field optional):
//!
//! - `FLEET_BIND_ADDR`         (default: "0.0.0.0")
//! - `FLEET_PORT`              (default: "5000")
//! - `FLEET_MAX_CLIENTS`       (default: "1024")
//! - `FLEET_SNAPSHOT_PATH`     (default: "server_cars.json", empty disables persistence)
//! - `FLEET_IDLE_TIMEOUT_SECS` (default: "300", "0" disables)
//! - `FLEET_MAX_FRAME_LEN`     (default: 16 MiB)

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fleet_protocol::wire_types::DEFAULT_MAX_FRAME_LEN;
use serde::Deserialize;

use crate::error::ServerError;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Where the last pushed snapshot is kept across restarts.
    /// `None` keeps it in memory only.
    pub snapshot_path: Option<PathBuf>,

    /// Close a session after this many seconds without a frame. `0` disables.
    pub idle_timeout_secs: u64,

    /// Largest accepted frame body, in bytes.
    pub max_frame_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            max_clients: 1024,
            snapshot_path: Some(PathBuf::from("server_cars.json")),
            idle_timeout_secs: 300,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self, ServerError> {
        let defaults = Config::default();

        let bind_addr = env::var("FLEET_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("FLEET_PORT", defaults.port)?;
        let max_clients = read_env_or_default("FLEET_MAX_CLIENTS", defaults.max_clients)?;
        let idle_timeout_secs =
            read_env_or_default("FLEET_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?;
        let max_frame_len = read_env_or_default("FLEET_MAX_FRAME_LEN", defaults.max_frame_len)?;

        let snapshot_path = match env::var("FLEET_SNAPSHOT_PATH") {
            Ok(val) if val.trim().is_empty() => None,
            Ok(val) => Some(PathBuf::from(val)),
            Err(_) => defaults.snapshot_path,
        };

        let config = Config {
            bind_addr,
            port,
            max_clients,
            snapshot_path,
            idle_timeout_secs,
            max_frame_len,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ServerError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.max_clients == 0 {
            return Err(ServerError::Config("max_clients must be at least 1".into()));
        }
        if self.max_frame_len == 0 || self.max_frame_len > u32::MAX as usize {
            return Err(ServerError::Config(format!(
                "max_frame_len must be between 1 and {}",
                u32::MAX
            )));
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| ServerError::Config(format!("{}={:?}: {}", key, val, e))),
        Err(_) => Ok(default),
    }
}
