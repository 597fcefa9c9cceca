// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry sources.
//!
//! A source produces one [`TelemetrySnapshot`] per call and never fails:
//! a sensor that cannot be read yields an empty or `"Error"` value instead.

use crate::protocol::TelemetrySnapshot;
use std::process::Command;
use tracing::{debug, warn};

/// Default binary queried by [`VcgencmdSource`].
pub const DEFAULT_VCGENCMD: &str = "vcgencmd";

/// Value reported when a sensor answered with something unparsable.
pub const ERROR_VALUE: &str = "Error";

/// Provider of device telemetry.
pub trait TelemetrySource: Send + Sync {
    /// Read all five fields. Blocking.
    fn collect(&self) -> TelemetrySnapshot;
}

/// Reads the Raspberry Pi firmware through `vcgencmd`.
#[derive(Debug, Clone)]
pub struct VcgencmdSource {
    program: String,
}

impl Default for VcgencmdSource {
    fn default() -> Self {
        Self::new(DEFAULT_VCGENCMD)
    }
}

impl VcgencmdSource {
    /// Create a source that invokes `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run one sub-command and return its trimmed stdout.
    fn query(&self, args: &[&str]) -> String {
        match Command::new(&self.program).args(args).output() {
            Ok(output) => {
                if !output.status.success() {
                    debug!("{} {:?} exited with {}", self.program, args, output.status);
                }
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Err(e) => {
                warn!("Failed to run {} {:?}: {}", self.program, args, e);
                String::new()
            }
        }
    }
}

impl TelemetrySource for VcgencmdSource {
    fn collect(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            temperature_c: parse_temperature(&self.query(&["measure_temp"])),
            core_voltage_v: parse_core_voltage(&self.query(&["measure_volts", "core"])),
            arm_frequency_mhz: parse_arm_frequency(&self.query(&["measure_clock", "arm"])),
            firmware_version: parse_firmware_version(&self.query(&["version"])),
            pmic_ext5v_voltage: first_line(&self.query(&["pmic_read_adc", "EXT5V_V"])),
        }
    }
}

/// `temp=45.2'C` -> `45.2`
pub fn parse_temperature(output: &str) -> String {
    first_line(output)
        .replace("temp=", "")
        .replace("'C", "")
}

/// `volt=0.8563V` -> `0.8563`
pub fn parse_core_voltage(output: &str) -> String {
    first_line(output).replace("volt=", "").replace('V', "")
}

/// `frequency(48)=1500398464` -> `1500.398464`
pub fn parse_arm_frequency(output: &str) -> String {
    let hz = first_line(output)
        .split_once('=')
        .and_then(|(_, v)| v.trim().parse::<u64>().ok());
    match hz {
        Some(hz) => format_mhz(hz),
        None => ERROR_VALUE.to_string(),
    }
}

/// First line of `vcgencmd version`.
pub fn parse_firmware_version(output: &str) -> String {
    first_line(output)
}

fn format_mhz(hz: u64) -> String {
    let mhz = hz as f64 / 1_000_000.0;
    if mhz.fract() == 0.0 {
        format!("{:.1}", mhz)
    } else {
        mhz.to_string()
    }
}

fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("").trim().to_string()
}

/// Fixed snapshot, for demos and tests.
#[derive(Debug, Clone)]
pub struct StaticSource {
    snapshot: TelemetrySnapshot,
}

impl StaticSource {
    pub fn new(snapshot: TelemetrySnapshot) -> Self {
        Self { snapshot }
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(TelemetrySnapshot {
            temperature_c: "47.2".into(),
            core_voltage_v: "0.8563".into(),
            arm_frequency_mhz: "1500.0".into(),
            firmware_version: "Mar 24 2025 17:40:52".into(),
            pmic_ext5v_voltage: "EXT5V_V volt(24)=5.11845000V".into(),
        })
    }
}

impl TelemetrySource for StaticSource {
    fn collect(&self) -> TelemetrySnapshot {
        self.snapshot.clone()
    }
}
