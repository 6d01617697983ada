//! # CPE Monitor Library
//!
//! This library polls an Askey RTL6300 5G CPE router over its REST API and
//! exposes the readings as a flat set of named metrics. The router answers on
//! `http://<host>/restful/<path>` with a `{"Status", "ModuleCommand", "Result"}`
//! envelope; several endpoints report a non-`ok` status for features the unit
//! does not support, so partial data is the normal case rather than a fault.
//!
//! ## Overview
//!
//! The library is organized into modules that each own one concern:
//!
//! - `error`: Error types for the whole crate
//! - `config`: JSON5 configuration with defaults and validation
//! - `transport`: The single owned HTTP client and the envelope check
//! - `accessor`: Safe nested lookups into the router's JSON
//! - `catalog`: The endpoints polled every cycle
//! - `snapshot`: The immutable result of one cycle
//! - `coordinator`: The polling loop and on-demand refreshes
//! - `sensors`: Declarative metric readers over the latest snapshot
//! - `commands`: Write commands (SMS, inbox, restart, reconnect) and notifications
//! - `server`: The HTTP surface the host talks to
//! - `utils`: Small numeric and formatting helpers
//!
//! ## Getting Started
//!
//! ```no_run
//! use cpe_monitor::{config::{Config, CONFIG_FILE}, server};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cpe_monitor::error::MonitorError> {
//!     let config = Config::load(Path::new(CONFIG_FILE))?;
//!     server::run(config, CancellationToken::new()).await
//! }
//! ```
//!
//! ## Architecture
//!
//! - The coordinator fans out one request per catalog endpoint, waits for all
//!   of them, and installs a new snapshot with a single reference swap
//! - A cycle in which at least one endpoint answered is a success; failed
//!   sources are kept in the snapshot as `null` with their reason
//! - Sensors never fetch; they project the current snapshot through the accessor
//! - Commands go through the same transport and trigger a refresh afterwards

/// Custom error types module
///
/// Defines `MonitorError` for startup and serving, plus the per-component
/// failures (`TransportError`, `FieldAccessError`, `CycleError`,
/// `CommandError`) that are recovered where they occur.
pub mod error;

/// Configuration management module
///
/// Loads the router host, polling interval, request timeout and listen port
/// from a JSON5 file, falling back to defaults when the file or a field is
/// missing.
pub mod config;

/// Device transport module
///
/// Owns the connection pool used for every router request and turns the
/// response envelope into either the payload or a typed `TransportError`.
pub mod transport;

/// JSON field accessor module
///
/// Path-based lookups that report misses as values instead of panicking, and
/// the normalization of the router's two shapes for carrier measurements.
pub mod accessor;

/// Endpoint catalog module
pub mod catalog;

/// Snapshot module
///
/// The per-cycle aggregate of every source's payload or failure.
pub mod snapshot;

/// Polling coordinator module
///
/// Runs one cycle at a time on a fixed interval, coalesces manual refreshes
/// into the in-flight cycle, and publishes snapshots and health over `watch`
/// channels.
pub mod coordinator;

/// Sensor table module
///
/// Every metric as one declarative row: source, location, conversion and the
/// metadata the host displays.
pub mod sensors;

/// Command dispatcher module
///
/// Parses, validates and executes write commands, fans out notifications and
/// refreshes the snapshot afterwards.
pub mod commands;

/// Web server module
///
/// Serves the latest snapshot, sensor values, health, refresh and command
/// endpoints, plus server-sent event streams, and shuts down gracefully.
pub mod server;

/// Utility functions module
pub mod utils;
