// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded telemetry server.
//!
//! Connections are served strictly one at a time: accept, collect, send,
//! close. After `max_connections` accepted connections the listener is
//! dropped, so any later connect attempt is refused by the OS. That refusal
//! is the only shutdown signal clients ever see.

use crate::config::{ConfigError, ServerConfig};
use crate::protocol::{encode, EncodeError};
use crate::source::TelemetrySource;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept` (e.g. out of file descriptors).
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while serving a single connection.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("telemetry collection failed: {0}")]
    Collect(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Count of accepted connections. Only ever goes up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCounter(u32);

impl ConnectionCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Record one accepted connection and return its 1-based number.
    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Whether the connection numbered `self` may still receive a payload.
    pub fn may_serve(&self, max: u32) -> bool {
        self.0 <= max
    }

    /// Whether the server must stop accepting.
    pub fn exhausted(&self, max: u32) -> bool {
        self.0 >= max
    }
}

/// Outcome of a completed [`TelemetryServer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    /// Accepted connections.
    pub connections: u32,
    /// Connections that received a full payload.
    pub served: u32,
    /// Connections that failed after being accepted.
    pub failed: u32,
}

/// Telemetry server bound to its listening socket.
pub struct TelemetryServer {
    config: ServerConfig,
    source: Arc<dyn TelemetrySource>,
    listener: TcpListener,
    counter: ConnectionCounter,
    served: u32,
    failed: u32,
}

impl TelemetryServer {
    /// Validate `config` and bind the listener.
    pub async fn bind(
        config: ServerConfig,
        source: Arc<dyn TelemetrySource>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!("Server is transmitting on {}", listener.local_addr()?);

        Ok(Self {
            config,
            source,
            listener,
            counter: ConnectionCounter::new(),
            served: 0,
            failed: 0,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> u32 {
        self.counter.get()
    }

    /// Serve until `max_connections` connections have been accepted.
    ///
    /// The listener is released before this returns.
    pub async fn run(mut self) -> ServeSummary {
        let max = self.config.max_connections;

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let number = self.counter.increment();
            info!("Connection #{} from {}", number, peer_addr);

            match self.serve(stream, number).await {
                Ok(true) => {
                    self.served += 1;
                    debug!("Data sent to {}", peer_addr);
                }
                Ok(false) => {}
                Err(e) => {
                    self.failed += 1;
                    warn!("Connection #{} from {} failed: {}", number, peer_addr, e);
                }
            }

            if self.counter.exhausted(max) {
                info!("Reached the maximum limit of {} connections", max);
                break;
            }
        }

        drop(self.listener);
        info!("Listener closed, server terminated");

        ServeSummary {
            connections: self.counter.get(),
            served: self.served,
            failed: self.failed,
        }
    }

    /// Collect, encode and send one snapshot. Returns whether it was sent.
    async fn serve(&self, mut stream: TcpStream, number: u32) -> Result<bool, ServeError> {
        let source = Arc::clone(&self.source);
        let snapshot = tokio::task::spawn_blocking(move || source.collect())
            .await
            .map_err(|e| ServeError::Collect(e.to_string()))?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(pretty) = serde_json::to_string_pretty(&snapshot) {
                debug!("Data collected:\n{}", pretty);
            }
        }

        let payload = encode(&snapshot)?;

        if !self.counter.may_serve(self.config.max_connections) {
            debug!("Connection #{} over limit, not sending", number);
            return Ok(false);
        }

        stream.write_all(&payload).await?;
        stream.shutdown().await?;
        Ok(true)
    }
}
