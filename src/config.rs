use crate::protocol::DEFAULT_PORT;
use crate::state::NamedIds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Persistent configuration of one processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique identifier (used in entity ids)
    pub identifier: String,

    /// Friendly name for display and logs
    pub name: String,

    /// IP address or hostname
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Last committed source list
    #[serde(default)]
    pub sources: NamedIds,

    /// Last committed preset list
    #[serde(default)]
    pub presets: NamedIds,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl DeviceConfig {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            address: address.into(),
            port: DEFAULT_PORT,
            sources: NamedIds::new(),
            presets: NamedIds::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Identifier used in log lines: the name, or the identifier if unnamed
    pub fn log_id(&self) -> &str {
        if self.name.is_empty() {
            &self.identifier
        } else {
            &self.name
        }
    }
}

/// Time limits for connecting and for awaited confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Opening the TCP connection
    pub connect: Duration,

    /// Default wait for a confirming response line
    pub response: Duration,

    /// Wait for the processor to finish booting after power on.
    /// Host commands time out after 10 s, so keep this below that.
    pub power_on: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            response: Duration::from_secs(5),
            power_on: Duration::from_secs(9),
        }
    }
}
