// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pitelem polling client
//!
//! Fetches a telemetry snapshot from a pitelem server every few seconds and
//! prints it. Stops by itself once the server refuses connections.
//!
//! # Usage
//!
//! ```bash
//! # Poll a local server, start immediately
//! pitelem-client --auto-start
//!
//! # Poll a Pi on the LAN every 5 seconds
//! pitelem-client --host 192.168.1.42 --interval 5000
//! ```
//!
//! Commands on stdin: `start`, `stop`, `exit`.

mod sink;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use pitelem::{ClientCommand, ClientConfig, ClientSession};
use sink::TerminalSink;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// pitelem client - polls a pitelem server for device telemetry
#[derive(Parser, Debug)]
#[command(name = "pitelem-client")]
#[command(about = "Poll a pitelem server for device telemetry")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Milliseconds between fetches
    #[arg(short, long, default_value = "2000")]
    interval: u64,

    /// Fetch timeout in milliseconds (connect + read)
    #[arg(short, long, default_value = "1000")]
    timeout: u64,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start fetching without waiting for a `start` command
    #[arg(long)]
    auto_start: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => ClientConfig {
                host: self.host.clone(),
                port: self.port,
                fetch_interval_ms: self.interval,
                fetch_timeout_ms: self.timeout,
                ..Default::default()
            },
        };
        config.validate().context("Invalid client configuration")?;
        Ok(config)
    }
}

/// Map an operator input line to a command.
fn parse_command(line: &str) -> Option<ClientCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => Some(ClientCommand::Start),
        "stop" | "x" => Some(ClientCommand::Stop),
        "exit" | "quit" | "q" => Some(ClientCommand::Exit),
        _ => None,
    }
}

/// Forward stdin lines as commands until stdin closes or `exit` is read.
///
/// Runs on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn read_commands(tx: mpsc::Sender<ClientCommand>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(command) => {
                debug!("Operator command: {:?}", command);
                if tx.blocking_send(command).is_err() || command == ClientCommand::Exit {
                    return;
                }
            }
            None => println!("{}", "Commands: start | stop | exit".yellow()),
        }
    }
    let _ = tx.blocking_send(ClientCommand::Exit);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("pitelem={0},pitelem_client={0}", args.log_level))
    });
    fmt().with_env_filter(filter).with_target(false).init();

    let config = args.client_config()?;
    info!("Polling {}", config.server_addr());

    println!("{}", "pitelem client".cyan().bold());
    println!("  Server:   {}", config.server_addr());
    println!("  Interval: {:?}", config.fetch_interval());
    println!("  Commands: start | stop | exit");
    println!();

    let (tx, rx) = mpsc::channel(16);
    if args.auto_start {
        tx.send(ClientCommand::Start).await?;
    }

    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal_tx.send(ClientCommand::Exit).await;
        }
    });
    std::thread::spawn(move || read_commands(tx));

    let mut session = ClientSession::new(config, TerminalSink::new());
    session.run(rx).await;

    info!(
        fetches = session.state().fetch_count(),
        status = %session.state().status(),
        "Client exited"
    );
    Ok(())
}
