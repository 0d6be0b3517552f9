//! Configuration for the hub server.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{HubError, Result};

/// Where the hub server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubServerConfig {
    /// Address to bind
    /// Default: 0.0.0.0
    pub host: IpAddr,

    /// Inclusive port range; the first free port is used.
    /// A range of `(0, 0)` lets the OS pick.
    /// Default: (8000, 8000)
    pub port_range: (u16, u16),
}

impl Default for HubServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port_range: (8000, 8000),
        }
    }
}

impl HubServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback with an OS-assigned port.
    pub fn ephemeral() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port_range: (0, 0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.port_range;
        if start > end {
            return Err(HubError::ServerStart(format!(
                "Invalid port range: start {start} is after end {end}"
            )));
        }
        if start == 0 && end != 0 {
            return Err(HubError::ServerStart(
                "Port range may only start at 0 when it is exactly (0, 0)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Listen on exactly `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port_range = (port, port);
        self
    }

    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = (start, end);
        self
    }
}
