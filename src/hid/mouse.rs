//! HID mouse input report (boot protocol compatible).
//!
//! Layout (3 bytes, report ID 1 in report protocol):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left, Bit 1 = Right, Bit 2 = Middle
//! Byte 1: X displacement (signed)
//! Byte 2: Y displacement (signed)
//! ```
//!
//! The boot mouse report has the same first three bytes, so one
//! encoding serves both protocol modes.

/// Mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 3;

pub const BUTTON_LEFT: u8 = 0x01;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield (bit 0 = left, bit 1 = right, bit 2 = middle).
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
}

impl MouseReport {
    pub const fn new(buttons: u8, x: i8, y: i8) -> Self {
        Self { buttons, x, y }
    }

    /// Fixed 3-byte encoding; deltas are written as their two's-complement byte.
    pub const fn encode(&self) -> [u8; MOUSE_REPORT_SIZE] {
        [self.buttons, self.x as u8, self.y as u8]
    }

    /// Serialise into a byte slice.
    /// Returns the number of bytes written (3), or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[..MOUSE_REPORT_SIZE].copy_from_slice(&self.encode());
        MOUSE_REPORT_SIZE
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0
    }
}
