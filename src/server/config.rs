//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::{HandoffPolicy, RegistryConfig};
use crate::session::DEFAULT_KEEPALIVE_INTERVAL;

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent streams (0 = unlimited)
    pub max_connections: usize,

    /// Idle time after which a stream receives a keepalive frame
    pub keepalive_interval: Duration,

    /// Frames buffered between a session and its socket
    pub output_buffer: usize,

    /// Registry settings (handoff policy, participant limit)
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            output_buffer: 16,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum concurrent streams
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set keepalive interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set per-stream output buffer, in frames
    pub fn output_buffer(mut self, frames: usize) -> Self {
        self.output_buffer = frames;
        self
    }

    /// Set the mailbox handoff policy
    pub fn handoff(mut self, policy: HandoffPolicy) -> Self {
        self.registry.handoff = policy;
        self
    }

    /// Replace the registry configuration
    pub fn registry(mut self, config: RegistryConfig) -> Self {
        self.registry = config;
        self
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.keepalive_interval.is_zero() {
            return Err(Error::Config("keepalive interval must be non-zero".into()));
        }
        if self.output_buffer == 0 {
            return Err(Error::Config("output buffer must hold at least one frame".into()));
        }
        match self.registry.handoff {
            HandoffPolicy::Buffered { capacity: 0 } => Err(Error::Config(
                "buffered handoff capacity must be non-zero".into(),
            )),
            HandoffPolicy::Timeout(limit) if limit.is_zero() => {
                Err(Error::Config("handoff timeout must be non-zero".into()))
            }
            _ => Ok(()),
        }
    }
}
