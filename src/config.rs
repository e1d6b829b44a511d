//! Application-wide constants and compile-time configuration.
//!
//! Advertising parameters, security policy, queue sizing, console
//! settings and flash layout live here so they can be tuned in one place.

// BLE identity & advertising

/// GAP device name (also put in the advertising payload).
pub const DEVICE_NAME: &str = "HID";

/// GAP appearance: generic HID.
pub const APPEARANCE_HID_GENERIC: u16 = 0x03C0;

/// Advertising interval (in 0.625 ms units). 0x20 = 20 ms.
pub const ADV_INTERVAL: u16 = 0x20;

/// Preferred peripheral connection interval (in 1.25 ms units).
/// 6 = 7.5 ms, 16 = 20 ms.
pub const CONN_INTERVAL_MIN: u16 = 0x0006;
pub const CONN_INTERVAL_MAX: u16 = 0x0010;

/// Include TX power level in the advertising payload.
pub const ADV_INCLUDE_TX_POWER: bool = true;

/// TX power advertised when `ADV_INCLUDE_TX_POWER` is set (dBm).
pub const ADV_TX_POWER_DBM: i8 = 0;

// Device information & battery

/// Device Information Service manufacturer name string.
pub const MANUFACTURER_NAME: &str = "ble-kbm";

/// PnP ID: vendor ID source (0x02 = USB-IF), vendor, product and version.
pub const PNP_VENDOR_ID_SOURCE: u8 = 0x02;
pub const PNP_VENDOR_ID: u16 = 0x1915;
pub const PNP_PRODUCT_ID: u16 = 0xEEEE;
pub const PNP_PRODUCT_VERSION: u16 = 0x0001;

/// Battery level reported by the Battery Service. The board is powered
/// over USB, so this is fixed.
pub const BATTERY_LEVEL_PERCENT: u8 = 100;

// Security

/// Bond with the central after pairing.
pub const SEC_BOND: bool = true;

/// Require MITM protection: passkey entry on the console, and HID
/// attributes readable only over an authenticated link.
pub const SEC_MITM: bool = true;

/// Maximum number of bonded centrals kept by the transport.
pub const MAX_BONDED_DEVICES: usize = 4;

// Report directory

/// Capacity of the report directory table.
pub const MAX_REPORTS: usize = 10;

// Command queues

pub const PASSKEY_QUEUE_CAPACITY: usize = 1;
pub const KEYBOARD_QUEUE_CAPACITY: usize = 8;
pub const MOUSE_QUEUE_CAPACITY: usize = 8;
pub const ADMIN_QUEUE_CAPACITY: usize = 1;
pub const CONSUMER_QUEUE_CAPACITY: usize = 4;
pub const TEXT_QUEUE_CAPACITY: usize = 32;

/// How long a console command may wait for room in a full queue (ms).
pub const QUEUE_SEND_TIMEOUT_MS: u64 = 10;

// Serial console

/// Maximum accepted console line length (bytes, excluding terminator).
pub const CONSOLE_MAX_LINE: usize = 128;

/// Maximum whitespace-separated arguments on one console line.
pub const CONSOLE_MAX_ARGS: usize = 8;

/// Console UART baud rate.
pub const CONSOLE_BAUD: u32 = 115_200;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   UART TX  → P0.06
//   UART RX  → P0.08

// Bond storage

/// Flash page index where bond storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;
