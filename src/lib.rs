//! nus-pilot: unattended BLE central that drives one NUS peripheral.
//!
//! Everything except the hardware glue lives here so it can be tested
//! on the host (no embedded hardware required).
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and is built with `--features embedded`.

#![cfg_attr(not(test), no_std)]

// Must stay first: the logging macros are textually scoped.
#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod controller;
pub mod error;
pub mod indicator;
pub mod sim;
pub mod time;

pub use config::Config;
pub use controller::{Controller, RunReport, Sequencer};
pub use error::{Error, Phase};
