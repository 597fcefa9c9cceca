// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry exchange wire protocol.
//!
//! One snapshot per TCP connection. The client connects (connecting is the
//! request), the server writes a single JSON object and closes. There is no
//! length prefix: EOF delimits the payload.
//!
//! Wire format:
//! ```text
//! client                          server
//!   | ---------- connect ---------> |
//!   | <------ JSON payload -------- |
//!   | <---------- FIN ------------- |
//! ```
//!
//! Payload:
//! ```text
//! {"Temperature_C":"45.2","Core_Voltage_V":"0.8563","ARM_Frequency_MHz":"1500.0",
//!  "Firmware_Version":"Mar 24 2025 ...","PMIC_EXT5V_Voltage":"5.1234V"}
//! ```
//!
//! All values are JSON strings, including numeric-looking ones.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default TCP port served by the device.
pub const DEFAULT_PORT: u16 = 5000;

/// Default host the client polls.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Connections served before the server closes its listener.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 50;

/// Time between two fetch cycles.
pub const FETCH_INTERVAL: Duration = Duration::from_secs(2);

/// Bound on connect + read for one fetch cycle.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Scheduler tick of the client.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest payload the client accepts.
pub const MAX_PAYLOAD_SIZE: usize = 4096;

/// The five telemetry keys, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryField {
    TemperatureC,
    CoreVoltageV,
    ArmFrequencyMhz,
    FirmwareVersion,
    PmicExt5vVoltage,
}

impl TelemetryField {
    /// All fields in wire order.
    pub const ALL: [TelemetryField; 5] = [
        TelemetryField::TemperatureC,
        TelemetryField::CoreVoltageV,
        TelemetryField::ArmFrequencyMhz,
        TelemetryField::FirmwareVersion,
        TelemetryField::PmicExt5vVoltage,
    ];

    /// JSON key used on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Self::TemperatureC => "Temperature_C",
            Self::CoreVoltageV => "Core_Voltage_V",
            Self::ArmFrequencyMhz => "ARM_Frequency_MHz",
            Self::FirmwareVersion => "Firmware_Version",
            Self::PmicExt5vVoltage => "PMIC_EXT5V_Voltage",
        }
    }

    /// Whether the client rounds this field for display.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TemperatureC | Self::CoreVoltageV | Self::ArmFrequencyMhz
        )
    }

    /// Look a field up by its wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A complete telemetry reading as produced by a [`TelemetrySource`].
///
/// Field order matches the wire order, so encoding is deterministic.
///
/// [`TelemetrySource`]: crate::source::TelemetrySource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "Temperature_C")]
    pub temperature_c: String,
    #[serde(rename = "Core_Voltage_V")]
    pub core_voltage_v: String,
    #[serde(rename = "ARM_Frequency_MHz")]
    pub arm_frequency_mhz: String,
    #[serde(rename = "Firmware_Version")]
    pub firmware_version: String,
    #[serde(rename = "PMIC_EXT5V_Voltage")]
    pub pmic_ext5v_voltage: String,
}

impl TelemetrySnapshot {
    /// Value of a single field.
    pub fn get(&self, field: TelemetryField) -> &str {
        match field {
            TelemetryField::TemperatureC => &self.temperature_c,
            TelemetryField::CoreVoltageV => &self.core_voltage_v,
            TelemetryField::ArmFrequencyMhz => &self.arm_frequency_mhz,
            TelemetryField::FirmwareVersion => &self.firmware_version,
            TelemetryField::PmicExt5vVoltage => &self.pmic_ext5v_voltage,
        }
    }
}

/// Decoded payload. A key missing on the wire is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialTelemetry {
    pub temperature_c: Option<String>,
    pub core_voltage_v: Option<String>,
    pub arm_frequency_mhz: Option<String>,
    pub firmware_version: Option<String>,
    pub pmic_ext5v_voltage: Option<String>,
}

impl PartialTelemetry {
    /// Value of a single field, if it was present.
    pub fn get(&self, field: TelemetryField) -> Option<&str> {
        match field {
            TelemetryField::TemperatureC => self.temperature_c.as_deref(),
            TelemetryField::CoreVoltageV => self.core_voltage_v.as_deref(),
            TelemetryField::ArmFrequencyMhz => self.arm_frequency_mhz.as_deref(),
            TelemetryField::FirmwareVersion => self.firmware_version.as_deref(),
            TelemetryField::PmicExt5vVoltage => self.pmic_ext5v_voltage.as_deref(),
        }
    }

    fn slot(&mut self, field: TelemetryField) -> &mut Option<String> {
        match field {
            TelemetryField::TemperatureC => &mut self.temperature_c,
            TelemetryField::CoreVoltageV => &mut self.core_voltage_v,
            TelemetryField::ArmFrequencyMhz => &mut self.arm_frequency_mhz,
            TelemetryField::FirmwareVersion => &mut self.firmware_version,
            TelemetryField::PmicExt5vVoltage => &mut self.pmic_ext5v_voltage,
        }
    }

    /// Fields present in this payload, in wire order.
    pub fn present(&self) -> impl Iterator<Item = (TelemetryField, &str)> + '_ {
        TelemetryField::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|v| (f, v)))
    }

    /// Fields missing from this payload.
    pub fn missing(&self) -> Vec<TelemetryField> {
        TelemetryField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// Upgrade to a full snapshot when every key is present.
    pub fn complete(self) -> Option<TelemetrySnapshot> {
        Some(TelemetrySnapshot {
            temperature_c: self.temperature_c?,
            core_voltage_v: self.core_voltage_v?,
            arm_frequency_mhz: self.arm_frequency_mhz?,
            firmware_version: self.firmware_version?,
            pmic_ext5v_voltage: self.pmic_ext5v_voltage?,
        })
    }
}

impl From<TelemetrySnapshot> for PartialTelemetry {
    fn from(s: TelemetrySnapshot) -> Self {
        Self {
            temperature_c: Some(s.temperature_c),
            core_voltage_v: Some(s.core_voltage_v),
            arm_frequency_mhz: Some(s.arm_frequency_mhz),
            firmware_version: Some(s.firmware_version),
            pmic_ext5v_voltage: Some(s.pmic_ext5v_voltage),
        }
    }
}

/// Payload decode errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is JSON but not an object (got {0})")]
    NotAnObject(&'static str),
}

/// Payload encode errors.
#[derive(Debug, Error)]
#[error("failed to encode telemetry: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Encode a snapshot into a single UTF-8 JSON payload.
pub fn encode(snapshot: &TelemetrySnapshot) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// Decode a payload.
///
/// Missing keys are not an error, unknown keys are ignored. `null` counts as
/// absent and non-string scalars are kept as their JSON text.
pub fn decode(bytes: &[u8]) -> Result<PartialTelemetry, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(text)?;

    let object = match value {
        Value::Object(map) => map,
        other => return Err(DecodeError::NotAnObject(json_kind(&other))),
    };

    let mut telemetry = PartialTelemetry::default();
    for (key, value) in object {
        let Some(field) = TelemetryField::from_key(&key) else {
            continue;
        };
        *telemetry.slot(field) = match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        };
    }

    Ok(telemetry)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
