// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server and client configuration.
//!
//! Both structs load from JSON with per-field defaults, so a config file
//! only needs the keys it changes.

use crate::protocol::{
    DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, FETCH_INTERVAL, FETCH_TIMEOUT,
    MAX_PAYLOAD_SIZE, POLL_INTERVAL,
};
use crate::source::DEFAULT_VCGENCMD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Device-side server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on (default: 5000, 0 picks an ephemeral port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connections served before the listener closes
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Path or name of the vcgencmd binary
    #[serde(default = "default_vcgencmd")]
    pub vcgencmd_path: String,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_vcgencmd() -> String {
    DEFAULT_VCGENCMD.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_connections: default_max_connections(),
            vcgencmd_path: default_vcgencmd(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections cannot be 0".into()));
        }
        if self.vcgencmd_path.trim().is_empty() {
            return Err(ConfigError::Invalid("vcgencmd_path cannot be empty".into()));
        }
        Ok(())
    }
}

/// Polling client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Milliseconds between fetch cycles
    #[serde(default = "default_fetch_interval_ms")]
    pub fetch_interval_ms: u64,

    /// Connect + read bound for one fetch cycle, in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Scheduler tick, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Largest accepted payload (bytes)
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_fetch_interval_ms() -> u64 {
    FETCH_INTERVAL.as_millis() as u64
}

fn default_fetch_timeout_ms() -> u64 {
    FETCH_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL.as_millis() as u64
}

fn default_max_payload_size() -> usize {
    MAX_PAYLOAD_SIZE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            fetch_interval_ms: default_fetch_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_payload_size: default_max_payload_size(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_json(path)
    }

    /// `host:port` of the server.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port cannot be 0".into()));
        }
        if self.fetch_interval_ms == 0 {
            return Err(ConfigError::Invalid("fetch_interval_ms cannot be 0".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_ms cannot be 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms cannot be 0".into()));
        }
        if self.max_payload_size == 0 {
            return Err(ConfigError::Invalid("max_payload_size cannot be 0".into()));
        }
        Ok(())
    }
}
