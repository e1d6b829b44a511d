//! Unified error type for ble-kbm.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (with the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The transport (SoftDevice / GATT server) rejected an operation.
    Transport(TransportError),

    /// No report is registered for the requested id/type in the active mode.
    ReportNotFound,

    // Queues
    /// A command queue stayed full for the whole send timeout.
    QueueFull,

    // Console
    /// A console line could not be parsed.
    Parse(ParseError),

    /// Console UART read/write failed.
    Uart,

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Subset of transport errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// GAP / GATT raw error code from the stack.
    Raw(u32),
    /// Advertising could not be (re)started.
    AdvertisingFailed,
    /// Notification could not be queued (not connected, not subscribed...).
    NotifyFailed,
    /// Attribute value read/write failed (illegal handle).
    AttributeFailed,
    /// Security / passkey reply was rejected.
    SecurityFailed,
    /// Bond store access failed.
    BondStoreFailed,
    /// No active connection.
    NotConnected,
}

/// Console parse failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// First word is not a known command.
    UnknownCommand,
    /// Wrong number of arguments.
    ArgumentCount,
    /// Argument is not a number or does not fit the field.
    InvalidNumber,
    /// Unknown consumer-control action name.
    UnknownAction,
    /// Line was empty.
    Empty,
}

// Convenience conversions

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}
