//! ble-kbm: BLE HID keyboard / mouse / consumer-control emulator.
//!
//! The device advertises the HID-over-GATT service, pairs with a host
//! using passkey entry, and turns operator console commands into HID
//! input reports.
//!
//! Everything outside [`nrf`] is hardware independent and tested on the
//! host:
//!
//! - [`hid`]: report map and report encoders
//! - [`ble`]: advertising payload, report directory, pairing state machine,
//!   bond table and the [`ble::Transport`] seam to the radio
//! - [`queues`]: bounded per-class command queues
//! - [`dispatch`]: drains the queues into transport calls
//! - [`console`]: console line parser
//!
//! Usage: `cargo test` on the host, `cargo run --release --features embedded`
//! on an nRF52840 with the S140 SoftDevice flashed.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod hid;
pub mod queues;

#[cfg(feature = "embedded")]
pub mod nrf;

pub use error::Error;
