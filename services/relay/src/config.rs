use std::path::Path;

use chat_protocol::DEFAULT_RELAY_PORT;
use serde::Deserialize;

use crate::error::RelayError;

/// Listen configuration for a single relay instance. The `[port]` CLI
/// argument is the primary surface; an optional YAML file (`--config`) can
/// override it for deployments that prefer a config file over a flag.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_RELAY_PORT
}

impl RelayConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(RelayError::ConfigRead)?;
        serde_yaml::from_str(&text).map_err(|e| RelayError::Config(e.to_string()))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { port: DEFAULT_RELAY_PORT }
    }
}
