//! HID report types and encoders.
//!
//! Report IDs match the report map served by the GATT HID service
//! (see [`report_map::REPORT_MAP`]).

pub mod consumer;
pub mod keyboard;
pub mod mouse;
pub mod report_map;

#[cfg(test)]
mod tests;

pub use consumer::{ConsumerAction, ConsumerReport};
pub use keyboard::KeyboardReport;
pub use mouse::MouseReport;

pub const REPORT_ID_MOUSE_IN: u8 = 1;
pub const REPORT_ID_KEYBOARD_IN: u8 = 2;
pub const REPORT_ID_CONSUMER_IN: u8 = 3;
/// Keyboard LED output report shares the keyboard collection's ID.
pub const REPORT_ID_LEDS_OUT: u8 = 2;

/// Largest report payload any encoder produces (boot keyboard).
pub const MAX_REPORT_SIZE: usize = keyboard::BOOT_KEYBOARD_REPORT_SIZE;

/// Value of the Report Reference descriptor's type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

/// Value of the Protocol Mode characteristic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ProtocolMode {
    Boot = 0,
    #[default]
    Report = 1,
}

impl ProtocolMode {
    /// Decode a host write. Anything but 0 is treated as report protocol.
    pub fn from_byte(b: u8) -> Self {
        if b == 0 {
            ProtocolMode::Boot
        } else {
            ProtocolMode::Report
        }
    }
}

/// An encoded input report and the ID it is sent under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    Consumer(ConsumerReport),
}

impl HidReport {
    /// Report ID in report protocol mode.
    pub fn report_id(&self) -> u8 {
        match self {
            HidReport::Keyboard(_) => REPORT_ID_KEYBOARD_IN,
            HidReport::Mouse(_) => REPORT_ID_MOUSE_IN,
            HidReport::Consumer(_) => REPORT_ID_CONSUMER_IN,
        }
    }

    /// Serialise for `mode`. Keyboard reports switch to the 8-byte boot
    /// layout in boot mode; the others are identical in both modes.
    /// Returns the number of bytes written, 0 if `buf` is too small.
    pub fn serialize(&self, mode: ProtocolMode, buf: &mut [u8]) -> usize {
        match (self, mode) {
            (HidReport::Keyboard(k), ProtocolMode::Boot) => k.serialize_boot(buf),
            (HidReport::Keyboard(k), ProtocolMode::Report) => k.serialize(buf),
            (HidReport::Mouse(m), _) => m.serialize(buf),
            (HidReport::Consumer(c), _) => c.serialize(buf),
        }
    }
}
