// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative client scheduler.

use super::fetch::fetch_telemetry;
use super::state::{ClientFetchState, ConnectionStatus, FetchOutcome};
use super::{ClientView, PresentationSink};
use crate::config::ClientConfig;
use crate::rounding::RoundedTelemetry;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Start,
    Stop,
    Exit,
}

/// A polling client bound to one server address and one sink.
pub struct ClientSession<S: PresentationSink> {
    config: ClientConfig,
    server: String,
    state: ClientFetchState,
    sink: S,
}

impl<S: PresentationSink> ClientSession<S> {
    pub fn new(config: ClientConfig, sink: S) -> Self {
        let server = config.server_addr();
        let state = ClientFetchState::new(config.fetch_interval());
        Self {
            config,
            server,
            state,
            sink,
        }
    }

    pub fn state(&self) -> &ClientFetchState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Current observable outputs.
    pub fn view(&self) -> ClientView {
        ClientView::from_state(&self.server, &self.state)
    }

    fn render(&mut self) {
        let view = self.view();
        self.sink.render(&view);
    }

    /// Begin auto-fetching. Ignored while already running.
    pub fn start(&mut self) {
        if !self.state.start() {
            debug!("Start ignored, auto fetch already running");
            return;
        }
        info!("Auto fetch started against {}", self.server);
        self.sink.notice(&format!(
            "Starting automated fetch every {:?}...",
            self.config.fetch_interval()
        ));
        self.render();
    }

    /// Stop auto-fetching. Returns the attempts made since the last start.
    pub fn stop(&mut self) -> u32 {
        let attempts = self.state.stop();
        info!("Auto fetch stopped after {} attempts", attempts);
        self.sink.notice(&format!(
            "--- Auto Fetch Stopped Manually at {} attempts. ---",
            attempts
        ));
        self.render();
        attempts
    }

    /// One scheduler tick. Runs a fetch cycle if one is due at `now` and
    /// returns the resulting status.
    pub async fn tick(&mut self, now: Instant) -> Option<ConnectionStatus> {
        let attempt = self.state.begin_fetch(now)?;
        self.render();

        let outcome = match fetch_telemetry(
            &self.server,
            self.config.fetch_timeout(),
            self.config.max_payload_size,
        )
        .await
        {
            Ok(telemetry) => {
                let rounded = RoundedTelemetry::from_partial(&telemetry);
                let missing = telemetry.missing();
                if !missing.is_empty() {
                    debug!("Fetch #{} payload missing {:?}", attempt, missing);
                }
                for field in rounded.unparsed_fields() {
                    debug!("Fetch #{}: {} is not numeric", attempt, field);
                }
                FetchOutcome::Success(rounded)
            }
            Err(e) if e.is_server_exit() => {
                info!("Fetch #{}: {}, server has exited", attempt, e);
                FetchOutcome::ServerExited
            }
            Err(e) => {
                warn!("Fetch #{} failed: {}", attempt, e);
                FetchOutcome::Failed(e.to_string())
            }
        };

        let notices = notices_for(attempt, &outcome);
        if !self.state.apply(outcome) {
            debug!("Fetch #{} result discarded", attempt);
            return None;
        }
        for line in notices {
            self.sink.notice(&line);
        }
        self.render();
        Some(self.state.status())
    }

    /// Run until [`ClientCommand::Exit`] or until `commands` closes.
    ///
    /// Commands are checked before every tick, so a stop always lands
    /// before the next scheduled fetch.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<ClientCommand>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.render();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(ClientCommand::Start) => {
                        self.start();
                        self.tick(Instant::now()).await;
                    }
                    Some(ClientCommand::Stop) => {
                        self.stop();
                    }
                    Some(ClientCommand::Exit) | None => {
                        debug!("Client session exiting");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    if self.state.is_running() {
                        self.tick(Instant::now()).await;
                    }
                }
            }
        }
    }
}

fn notices_for(attempt: u32, outcome: &FetchOutcome) -> Vec<String> {
    match outcome {
        FetchOutcome::Success(_) => Vec::new(),
        FetchOutcome::ServerExited => vec![
            "ERROR: Connection Refused. Server is likely shut down after reaching its connection limit."
                .to_string(),
            "--- Auto Fetch Terminated by Server Exit ---".to_string(),
        ],
        FetchOutcome::Failed(reason) => vec![format!(
            "An error occurred on fetch #{}: {}",
            attempt, reason
        )],
    }
}
