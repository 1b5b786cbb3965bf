//! Listener configuration.
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 2222;

/// Runtime configuration for the SSH listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address or hostname to bind the SSH listener to (e.g. `127.0.0.1`).
    pub bind: String,
    /// TCP port the SSH server should listen on.
    pub port: u16,
    /// Delay applied before answering a rejected authentication attempt, in milliseconds.
    #[serde(default = "default_rejection_delay_ms")]
    pub auth_rejection_delay_ms: u64,
}

impl ServerConfig {
    pub fn auth_rejection_time(&self) -> Duration {
        Duration::from_millis(self.auth_rejection_delay_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            auth_rejection_delay_ms: default_rejection_delay_ms(),
        }
    }
}

fn default_rejection_delay_ms() -> u64 {
    250
}
