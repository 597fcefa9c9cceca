// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Auto-fetch state machine.
//!
//! ```text
//!          start                 refused
//!   Idle -------> AutoFetching ----------> Idle (ServerExited)
//!     ^               |
//!     +----- stop ----+
//! ```
//!
//! No I/O happens here; the session feeds fetch outcomes back in.

use crate::rounding::RoundedTelemetry;
use std::fmt;
use std::time::{Duration, Instant};

/// Connection status shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Running,
    Success,
    ServerExited,
    Error,
}

impl ConnectionStatus {
    /// Short label for the status light.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Success => "Online",
            Self::ServerExited => "STOPPED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one fetch cycle, as seen by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Payload decoded.
    Success(RoundedTelemetry),
    /// Connection refused: the server reached its connection limit.
    ServerExited,
    /// Anything else (timeout, I/O, decode).
    Failed(String),
}

/// Client-owned fetch state.
#[derive(Debug, Clone)]
pub struct ClientFetchState {
    fetch_interval: Duration,
    running: bool,
    fetch_count: u32,
    last_fetch_time: Option<Instant>,
    led_on: bool,
    status: ConnectionStatus,
    status_text: String,
    telemetry: Option<RoundedTelemetry>,
}

impl ClientFetchState {
    /// Idle state with the given fetch interval.
    pub fn new(fetch_interval: Duration) -> Self {
        Self {
            fetch_interval,
            running: false,
            fetch_count: 0,
            last_fetch_time: None,
            led_on: false,
            status: ConnectionStatus::Idle,
            status_text: "Idle".to_string(),
            telemetry: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_count
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    pub fn last_fetch_time(&self) -> Option<Instant> {
        self.last_fetch_time
    }

    /// Last successfully decoded telemetry.
    pub fn telemetry(&self) -> Option<&RoundedTelemetry> {
        self.telemetry.as_ref()
    }

    pub fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    /// Idle -> AutoFetching. Returns `false` if already running.
    ///
    /// The first tick after a start is always due.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.fetch_count = 0;
        self.last_fetch_time = None;
        self.status = ConnectionStatus::Running;
        self.status_text = "Running".to_string();
        true
    }

    /// AutoFetching -> Idle, unconditionally. Returns the attempts made.
    pub fn stop(&mut self) -> u32 {
        self.running = false;
        self.status = ConnectionStatus::Idle;
        self.status_text = "Stopped".to_string();
        self.fetch_count
    }

    /// Whether a fetch should run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        match self.last_fetch_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.fetch_interval,
        }
    }

    /// Claim a fetch slot if one is due. Returns the 1-based attempt number.
    pub fn begin_fetch(&mut self, now: Instant) -> Option<u32> {
        if !self.is_due(now) {
            return None;
        }
        self.last_fetch_time = Some(now);
        self.fetch_count += 1;
        self.status_text = format!("Fetching #{}...", self.fetch_count);
        Some(self.fetch_count)
    }

    /// Apply a fetch outcome. Returns `false` when discarded because the
    /// state machine is no longer running.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if !self.running {
            return false;
        }
        match outcome {
            FetchOutcome::Success(telemetry) => {
                self.status = ConnectionStatus::Success;
                self.status_text = format!("SUCCESS (#{})", self.fetch_count);
                self.led_on = !self.led_on;
                self.telemetry = Some(telemetry);
            }
            FetchOutcome::ServerExited => {
                self.running = false;
                self.status = ConnectionStatus::ServerExited;
                self.status_text = "SERVER EXIT".to_string();
                self.led_on = false;
            }
            FetchOutcome::Failed(_) => {
                self.status = ConnectionStatus::Error;
                self.status_text = "ERROR".to_string();
                self.led_on = false;
            }
        }
        true
    }
}
