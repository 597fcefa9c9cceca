// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pitelem telemetry server
//!
//! Runs on the device. Every client that connects receives one JSON snapshot
//! of the vcgencmd readings; after `--max-connections` clients the listener
//! closes and the process exits.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default port (5000), 50 connections
//! pitelem-server
//!
//! # Custom port and limit
//! pitelem-server --port 5100 --max-connections 10
//!
//! # Off-device demo with fixed readings
//! pitelem-server --static --log-level debug
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use pitelem::{ServerConfig, StaticSource, TelemetryServer, TelemetrySource, VcgencmdSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// pitelem server - serves device telemetry to a bounded number of clients
#[derive(Parser, Debug)]
#[command(name = "pitelem-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "5000", value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Connections to serve before exiting
    #[arg(short, long, default_value = "50")]
    max_connections: u32,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// vcgencmd binary to query
    #[arg(long, default_value = "vcgencmd")]
    vcgencmd: String,

    /// Serve fixed readings instead of querying vcgencmd
    #[arg(long = "static")]
    static_readings: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("pitelem={0},pitelem_server={0}", args.log_level))
    });
    fmt().with_env_filter(filter).with_target(true).init();

    let config = if let Some(config_path) = &args.config {
        info!("Loading config from {:?}", config_path);
        ServerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config {:?}", config_path))?
    } else {
        ServerConfig {
            bind_address: args
                .bind
                .parse()
                .with_context(|| format!("Invalid bind address {:?}", args.bind))?,
            port: args.port,
            max_connections: args.max_connections,
            vcgencmd_path: args.vcgencmd.clone(),
        }
    };

    let source: Arc<dyn TelemetrySource> = if args.static_readings {
        Arc::new(StaticSource::default())
    } else {
        Arc::new(VcgencmdSource::new(config.vcgencmd_path.clone()))
    };

    info!("+----------------------------------------------------+");
    info!(
        "|       pitelem server v{:<28} |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!(
        "|  Bind:   {:40} |",
        format!("{}:{}", config.bind_address, config.port)
    );
    info!("|  Limit:  {:40} |", format!("{} connections", config.max_connections));
    info!(
        "|  Source: {:40} |",
        if args.static_readings {
            "static".to_string()
        } else {
            config.vcgencmd_path.clone()
        }
    );
    info!("+----------------------------------------------------+");

    let server = TelemetryServer::bind(config, source)
        .await
        .context("Failed to start server")?;

    tokio::select! {
        summary = server.run() => {
            info!(
                connections = summary.connections,
                served = summary.served,
                failed = summary.failed,
                "Server program terminated"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["pitelem-server"]);
        assert_eq!(args.port, 5000);
        assert_eq!(args.max_connections, 50);
        assert_eq!(args.bind, "0.0.0.0");
        assert!(!args.static_readings);
    }

    #[test]
    fn test_args_reject_port_zero() {
        assert!(Args::try_parse_from(["pitelem-server", "--port", "0"]).is_err());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "pitelem-server",
            "-p",
            "6000",
            "-m",
            "2",
            "--static",
        ]);
        assert_eq!(args.port, 6000);
        assert_eq!(args.max_connections, 2);
        assert!(args.static_readings);
    }
}
