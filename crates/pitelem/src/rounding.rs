// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Display view of a decoded payload.

use crate::protocol::{PartialTelemetry, TelemetryField};
use std::fmt::Write as _;

/// Header line of the rendered telemetry block.
pub const RENDER_HEADER: &str = "--- Device Data Received ---";

/// A single displayed value.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundedValue {
    /// Numeric field rounded to one decimal place.
    Number(f64),
    /// Non-numeric field, passed through.
    Text(String),
    /// Numeric field whose value did not parse; kept as received.
    Unparsed(String),
}

impl RoundedValue {
    /// Whether this is a numeric field that failed to parse.
    pub fn is_unparsed(&self) -> bool {
        matches!(self, Self::Unparsed(_))
    }
}

/// Rounded, read-only view of a [`PartialTelemetry`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoundedTelemetry {
    entries: Vec<(TelemetryField, RoundedValue)>,
}

impl RoundedTelemetry {
    /// Derive the view. Fields absent from the payload are absent here too.
    pub fn from_partial(telemetry: &PartialTelemetry) -> Self {
        let entries = telemetry
            .present()
            .map(|(field, raw)| (field, round_field(field, raw)))
            .collect();
        Self { entries }
    }

    /// Value for a field, if it was present.
    pub fn get(&self, field: TelemetryField) -> Option<&RoundedValue> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    /// Present entries in wire order.
    pub fn entries(&self) -> &[(TelemetryField, RoundedValue)] {
        &self.entries
    }

    /// Fields that were expected to be numeric but were not.
    pub fn unparsed_fields(&self) -> Vec<TelemetryField> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_unparsed())
            .map(|(f, _)| *f)
            .collect()
    }

    /// Multi-line text block shown to the operator.
    pub fn render_text(&self) -> String {
        let mut out = String::from(RENDER_HEADER);
        out.push('\n');
        for (field, value) in &self.entries {
            // Writing into a String cannot fail.
            let _ = match value {
                RoundedValue::Number(n) => writeln!(out, "{}:   {:.1}", field, n),
                RoundedValue::Text(s) => writeln!(out, "{}:   {}", field, s),
                RoundedValue::Unparsed(s) => writeln!(out, "{}:   {} (Error/Raw)", field, s),
            };
        }
        out
    }
}

/// Round to one decimal place, nearest to the exact decimal value.
///
/// Goes through the formatter: scaling by ten first can push a value like
/// `1.4499999` onto `14.5` and round it the wrong way.
pub fn round1(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}

fn round_field(field: TelemetryField, raw: &str) -> RoundedValue {
    if !field.is_numeric() {
        return RoundedValue::Text(raw.to_string());
    }
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => RoundedValue::Number(round1(n)),
        _ => RoundedValue::Unparsed(raw.to_string()),
    }
}
