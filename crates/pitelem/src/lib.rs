// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pitelem: single-board device telemetry over TCP.
//!
//! A device-side [`TelemetryServer`] hands one JSON snapshot to every client
//! that connects and closes its listener after a fixed number of
//! connections. A [`ClientSession`] polls it on a timer and stops on its own
//! once connections start being refused.
//!
//! # Example
//!
//! ```rust,ignore
//! use pitelem::{ServerConfig, StaticSource, TelemetryServer};
//! use std::sync::Arc;
//!
//! let server = TelemetryServer::bind(ServerConfig::default(), Arc::new(StaticSource::default())).await?;
//! let summary = server.run().await;
//! println!("served {} of {}", summary.served, summary.connections);
//! ```

pub mod client;
pub mod config;
pub mod protocol;
pub mod rounding;
pub mod server;
pub mod source;

pub use client::{
    ClientCommand, ClientFetchState, ClientSession, ClientView, ConnectionStatus, FetchError,
    FetchOutcome, NullSink, PresentationSink,
};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use protocol::{
    decode, encode, DecodeError, EncodeError, PartialTelemetry, TelemetryField,
    TelemetrySnapshot,
};
pub use rounding::{RoundedTelemetry, RoundedValue};
pub use server::{ConnectionCounter, ServeError, ServeSummary, ServerError, TelemetryServer};
pub use source::{StaticSource, TelemetrySource, VcgencmdSource};
