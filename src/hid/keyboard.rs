//! HID keyboard input report.
//!
//! Report protocol layout (2 bytes, report ID 2):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Key code (HID usage, 0 = released)
//! ```
//!
//! In boot protocol the host expects the standard 8-byte boot keyboard
//! report, produced by [`KeyboardReport::serialize_boot`].

/// Report-protocol keyboard report size in bytes.
pub const KEYBOARD_REPORT_SIZE: usize = 2;

/// Boot-protocol keyboard report size in bytes.
pub const BOOT_KEYBOARD_REPORT_SIZE: usize = 8;

pub const MOD_LEFT_SHIFT: u8 = 0x02;

/// Single-key keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// Pressed key code (0 = none).
    pub keycode: u8,
}

impl KeyboardReport {
    pub const fn new(modifier: u8, keycode: u8) -> Self {
        Self { modifier, keycode }
    }

    /// All keys released.
    pub const fn released() -> Self {
        Self {
            modifier: 0,
            keycode: 0,
        }
    }

    /// Fixed 2-byte report-protocol encoding.
    pub const fn encode(&self) -> [u8; KEYBOARD_REPORT_SIZE] {
        [self.modifier, self.keycode]
    }

    /// Serialise into a byte slice.
    /// Returns the number of bytes written (2), or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[..KEYBOARD_REPORT_SIZE].copy_from_slice(&self.encode());
        KEYBOARD_REPORT_SIZE
    }

    /// Serialise in the boot keyboard layout
    /// (`[modifier, reserved, key, 0, 0, 0, 0, 0]`).
    /// Returns the number of bytes written (8), or 0 if `buf` is too small.
    pub fn serialize_boot(&self, buf: &mut [u8]) -> usize {
        if buf.len() < BOOT_KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[..BOOT_KEYBOARD_REPORT_SIZE].fill(0);
        buf[0] = self.modifier;
        buf[2] = self.keycode;
        BOOT_KEYBOARD_REPORT_SIZE
    }

    /// Returns `true` if no keys are pressed (release event).
    pub fn is_released(&self) -> bool {
        self.modifier == 0 && self.keycode == 0
    }

    /// Report that presses the key producing `c` on a US layout.
    pub fn for_char(c: char) -> Option<Self> {
        char_to_key(c).map(|(modifier, keycode)| Self { modifier, keycode })
    }
}

// US layout ASCII → (modifier, usage)

const KEY_A: u8 = 0x04;
const KEY_1: u8 = 0x1E;
const KEY_0: u8 = 0x27;
const KEY_ENTER: u8 = 0x28;
const KEY_ESCAPE: u8 = 0x29;
const KEY_BACKSPACE: u8 = 0x2A;
const KEY_TAB: u8 = 0x2B;
const KEY_SPACE: u8 = 0x2C;

/// Map a character to the (modifier, key code) pair that types it.
///
/// Covers letters, digits, whitespace controls and US-layout punctuation.
pub fn char_to_key(c: char) -> Option<(u8, u8)> {
    let key = match c {
        'a'..='z' => (0, KEY_A + (c as u8 - b'a')),
        'A'..='Z' => (MOD_LEFT_SHIFT, KEY_A + (c as u8 - b'A')),
        '1'..='9' => (0, KEY_1 + (c as u8 - b'1')),
        '0' => (0, KEY_0),
        '\n' | '\r' => (0, KEY_ENTER),
        '\x1b' => (0, KEY_ESCAPE),
        '\x08' => (0, KEY_BACKSPACE),
        '\t' => (0, KEY_TAB),
        ' ' => (0, KEY_SPACE),
        '!' => (MOD_LEFT_SHIFT, KEY_1),
        '@' => (MOD_LEFT_SHIFT, KEY_1 + 1),
        '#' => (MOD_LEFT_SHIFT, KEY_1 + 2),
        '$' => (MOD_LEFT_SHIFT, KEY_1 + 3),
        '%' => (MOD_LEFT_SHIFT, KEY_1 + 4),
        '^' => (MOD_LEFT_SHIFT, KEY_1 + 5),
        '&' => (MOD_LEFT_SHIFT, KEY_1 + 6),
        '*' => (MOD_LEFT_SHIFT, KEY_1 + 7),
        '(' => (MOD_LEFT_SHIFT, KEY_1 + 8),
        ')' => (MOD_LEFT_SHIFT, KEY_0),
        '-' => (0, 0x2D),
        '_' => (MOD_LEFT_SHIFT, 0x2D),
        '=' => (0, 0x2E),
        '+' => (MOD_LEFT_SHIFT, 0x2E),
        '[' => (0, 0x2F),
        '{' => (MOD_LEFT_SHIFT, 0x2F),
        ']' => (0, 0x30),
        '}' => (MOD_LEFT_SHIFT, 0x30),
        '\\' => (0, 0x31),
        '|' => (MOD_LEFT_SHIFT, 0x31),
        ';' => (0, 0x33),
        ':' => (MOD_LEFT_SHIFT, 0x33),
        '\'' => (0, 0x34),
        '"' => (MOD_LEFT_SHIFT, 0x34),
        '`' => (0, 0x35),
        '~' => (MOD_LEFT_SHIFT, 0x35),
        ',' => (0, 0x36),
        '<' => (MOD_LEFT_SHIFT, 0x36),
        '.' => (0, 0x37),
        '>' => (MOD_LEFT_SHIFT, 0x37),
        '/' => (0, 0x38),
        '?' => (MOD_LEFT_SHIFT, 0x38),
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_usage_page_offsets() {
        assert_eq!(char_to_key('a'), Some((0, 0x04)));
        assert_eq!(char_to_key('z'), Some((0, 0x1D)));
        assert_eq!(char_to_key('Q'), Some((MOD_LEFT_SHIFT, 0x14)));
    }

    #[test]
    fn digits_wrap_zero_to_the_end() {
        assert_eq!(char_to_key('1'), Some((0, 0x1E)));
        assert_eq!(char_to_key('9'), Some((0, 0x26)));
        assert_eq!(char_to_key('0'), Some((0, 0x27)));
    }

    #[test]
    fn shifted_punctuation() {
        assert_eq!(char_to_key('!'), Some((MOD_LEFT_SHIFT, 0x1E)));
        assert_eq!(char_to_key('?'), Some((MOD_LEFT_SHIFT, 0x38)));
        assert_eq!(char_to_key('/'), Some((0, 0x38)));
    }

    #[test]
    fn unmapped_characters() {
        assert_eq!(char_to_key('é'), None);
        assert_eq!(char_to_key('\0'), None);
    }
}
