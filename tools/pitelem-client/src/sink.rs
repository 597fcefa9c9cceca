// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Terminal presentation for the polling client.

use colored::{ColoredString, Colorize};
use pitelem::{ClientView, ConnectionStatus, PresentationSink};

const LED_CHAR: &str = "●";

/// Prints status lines and telemetry blocks to stdout.
#[derive(Debug, Default)]
pub struct TerminalSink {
    last_status: Option<(ConnectionStatus, String)>,
    last_telemetry: Option<String>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Colored status badge.
pub fn status_light(status: ConnectionStatus) -> ColoredString {
    let label = format!(" {} ", status.label());
    match status {
        ConnectionStatus::Idle => label.white().on_bright_black(),
        ConnectionStatus::Running => label.black().on_yellow(),
        ConnectionStatus::Success => label.white().on_green(),
        ConnectionStatus::ServerExited | ConnectionStatus::Error => label.white().on_red(),
    }
}

/// "Data received" indicator.
pub fn led(view: &ClientView) -> ColoredString {
    match (view.status, view.led_on) {
        (ConnectionStatus::Success, true) => LED_CHAR.green(),
        (ConnectionStatus::Success, false) => LED_CHAR.bright_black(),
        _ => LED_CHAR.dimmed(),
    }
}

/// Single status line.
pub fn status_line(view: &ClientView) -> String {
    format!(
        "{} | Server: {} | Status: {} | Data Received: {}",
        status_light(view.status),
        view.server,
        view.status_text,
        led(view)
    )
}

impl PresentationSink for TerminalSink {
    fn render(&mut self, view: &ClientView) {
        let key = (view.status, view.status_text.clone());
        if self.last_status.as_ref() != Some(&key) {
            println!("{}", status_line(view));
            self.last_status = Some(key);
        }

        if view.status == ConnectionStatus::Success && view.telemetry_text != self.last_telemetry
        {
            if let Some(text) = &view.telemetry_text {
                println!("{}", text.trim_end().cyan());
            }
            self.last_telemetry = view.telemetry_text.clone();
        }
    }

    fn notice(&mut self, line: &str) {
        if line.starts_with("ERROR") || line.starts_with("An error") {
            println!("{}", line.red());
        } else {
            println!("{}", line.bold());
        }
    }
}
