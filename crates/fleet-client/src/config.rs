// crates/fleet-client/src/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use fleet_protocol::wire_types::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Configuration for the sync client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// How long a pull waits for the server's answer.
    pub response_timeout_ms: u64,
    /// Keep-alive period; `0` disables keep-alives.
    pub heartbeat_interval_secs: u64,
    pub max_frame_len: usize,
    /// Local record collection file.
    pub collection_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connect_timeout_ms: 5_000,
            response_timeout_ms: 10_000,
            heartbeat_interval_secs: 30,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            collection_path: PathBuf::from("cars.json"),
        }
    }
}

impl ClientConfig {
    /// Load a TOML file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }
}
