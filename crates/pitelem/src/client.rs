// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Polling client.
//!
//! [`ClientSession`] owns a [`ClientFetchState`] and drives it from a single
//! task: a fixed scheduler tick, operator commands, and inline fetch cycles.
//! Fetches never overlap, so outcomes are applied in the order they were
//! started.

pub mod fetch;
pub mod session;
pub mod state;

pub use fetch::{fetch_payload, fetch_telemetry, FetchError};
pub use session::{ClientCommand, ClientSession};
pub use state::{ClientFetchState, ConnectionStatus, FetchOutcome};

/// Everything a presentation layer may show.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    pub server: String,
    pub status: ConnectionStatus,
    pub status_text: String,
    pub running: bool,
    pub fetch_count: u32,
    pub led_on: bool,
    pub telemetry_text: Option<String>,
}

impl ClientView {
    pub fn from_state(server: &str, state: &ClientFetchState) -> Self {
        Self {
            server: server.to_string(),
            status: state.status(),
            status_text: state.status_text().to_string(),
            running: state.is_running(),
            fetch_count: state.fetch_count(),
            led_on: state.led_on(),
            telemetry_text: state.telemetry().map(|t| t.render_text()),
        }
    }
}

/// Renders client state. Implemented by the terminal UI and by tests.
pub trait PresentationSink: Send {
    /// Redraw after a state change.
    fn render(&mut self, view: &ClientView);

    /// Append a line to the output log.
    fn notice(&mut self, line: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn render(&mut self, _view: &ClientView) {}

    fn notice(&mut self, _line: &str) {}
}

impl<S: PresentationSink + ?Sized> PresentationSink for Box<S> {
    fn render(&mut self, view: &ClientView) {
        (**self).render(view)
    }

    fn notice(&mut self, line: &str) {
        (**self).notice(line)
    }
}
