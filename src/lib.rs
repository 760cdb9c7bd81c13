//! PlantNode firmware library.
//!
//! Connectivity and telemetry agent for a soil/climate monitoring node:
//! keeps the Wi-Fi link up ([`link`]), holds an MQTT-over-TLS session to
//! the collector ([`telemetry`]) and samples the sensors on a fixed
//! cadence ([`sampling`]).
//!
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; host builds get simulated adapters so everything
//! here is testable off-target.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod link;
pub mod pins;
pub mod readiness;
pub mod retry;
pub mod sampling;
pub mod telemetry;

pub mod adapters;
pub mod sensors;

mod esp_link_shims;

pub use error::{Error, Result};
