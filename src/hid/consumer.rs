//! Consumer Control HID support - media keys, volume, channel, power.
//!
//! The consumer report (report ID 3) is 2 bytes of packed fields:
//! ```text
//! Byte 0: bits 0-3 numeric key, bits 4-5 channel (+1 / -1),
//!         bit 6 volume up, bit 7 volume down
//! Byte 1: bits 0-3 button (mute, power, play, ...),
//!         bits 4-5 selection, bits 6-7 padding
//! ```
//!
//! Actions are written with the small bit-set helpers below so each
//! field is cleared before the new value is ORed in.

/// Consumer control report size.
pub const CONSUMER_REPORT_SIZE: usize = 2;

const CHANNEL_BITS: u8 = 0xCF;
const VOLUME_BITS: u8 = 0x3F;
const BUTTON_BITS: u8 = 0xF0;

// Channel field values (2-bit signed: +1 / -1).
const CHANNEL_UP: u8 = 0x01;
const CHANNEL_DOWN: u8 = 0x03;

// Button field values, in report map order.
const BTN_MUTE: u8 = 1;
const BTN_POWER: u8 = 2;
const BTN_LAST: u8 = 3;
const BTN_ASSIGN_SEL: u8 = 4;
const BTN_PLAY: u8 = 5;
const BTN_PAUSE: u8 = 6;
const BTN_RECORD: u8 = 7;
const BTN_FAST_FWD: u8 = 8;
const BTN_REWIND: u8 = 9;
const BTN_SCAN_NEXT_TRK: u8 = 10;
const BTN_SCAN_PREV_TRK: u8 = 11;
const BTN_STOP: u8 = 12;

/// Consumer actions, numbered by their Consumer page (0x0C) usage ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConsumerAction {
    Power = 0x30,
    AssignSelection = 0x81,
    RecallLast = 0x83,
    ChannelUp = 0x9C,
    ChannelDown = 0x9D,
    Play = 0xB0,
    Pause = 0xB1,
    Record = 0xB2,
    FastForward = 0xB3,
    Rewind = 0xB4,
    ScanNextTrack = 0xB5,
    ScanPrevTrack = 0xB6,
    Stop = 0xB7,
    Mute = 0xE2,
    VolumeUp = 0xE9,
    VolumeDown = 0xEA,
}

impl ConsumerAction {
    pub const ALL: [ConsumerAction; 16] = [
        ConsumerAction::Power,
        ConsumerAction::AssignSelection,
        ConsumerAction::RecallLast,
        ConsumerAction::ChannelUp,
        ConsumerAction::ChannelDown,
        ConsumerAction::Play,
        ConsumerAction::Pause,
        ConsumerAction::Record,
        ConsumerAction::FastForward,
        ConsumerAction::Rewind,
        ConsumerAction::ScanNextTrack,
        ConsumerAction::ScanPrevTrack,
        ConsumerAction::Stop,
        ConsumerAction::Mute,
        ConsumerAction::VolumeUp,
        ConsumerAction::VolumeDown,
    ];

    /// Look up an action by its usage ID.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| *a as u8 == code)
    }

    /// Console name of the action.
    pub const fn name(self) -> &'static str {
        match self {
            ConsumerAction::Power => "power",
            ConsumerAction::AssignSelection => "assign",
            ConsumerAction::RecallLast => "last",
            ConsumerAction::ChannelUp => "ch+",
            ConsumerAction::ChannelDown => "ch-",
            ConsumerAction::Play => "play",
            ConsumerAction::Pause => "pause",
            ConsumerAction::Record => "record",
            ConsumerAction::FastForward => "ff",
            ConsumerAction::Rewind => "rew",
            ConsumerAction::ScanNextTrack => "next",
            ConsumerAction::ScanPrevTrack => "prev",
            ConsumerAction::Stop => "stop",
            ConsumerAction::Mute => "mute",
            ConsumerAction::VolumeUp => "vol+",
            ConsumerAction::VolumeDown => "vol-",
        }
    }

    /// Look up an action by its console name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// 2-byte consumer control report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport {
    pub bytes: [u8; CONSUMER_REPORT_SIZE],
}

impl ConsumerReport {
    /// Nothing pressed.
    pub const fn empty() -> Self {
        Self {
            bytes: [0; CONSUMER_REPORT_SIZE],
        }
    }

    /// Report with a single action applied.
    pub fn new(action: ConsumerAction) -> Self {
        let mut report = Self::empty();
        report.apply(action);
        report
    }

    /// Write `action` into its field, leaving the other fields as they are.
    pub fn apply(&mut self, action: ConsumerAction) {
        let b = &mut self.bytes;
        match action {
            ConsumerAction::ChannelUp => set_channel(b, CHANNEL_UP),
            ConsumerAction::ChannelDown => set_channel(b, CHANNEL_DOWN),
            ConsumerAction::VolumeUp => set_volume_up(b),
            ConsumerAction::VolumeDown => set_volume_down(b),
            ConsumerAction::Mute => set_button(b, BTN_MUTE),
            ConsumerAction::Power => set_button(b, BTN_POWER),
            ConsumerAction::RecallLast => set_button(b, BTN_LAST),
            ConsumerAction::AssignSelection => set_button(b, BTN_ASSIGN_SEL),
            ConsumerAction::Play => set_button(b, BTN_PLAY),
            ConsumerAction::Pause => set_button(b, BTN_PAUSE),
            ConsumerAction::Record => set_button(b, BTN_RECORD),
            ConsumerAction::FastForward => set_button(b, BTN_FAST_FWD),
            ConsumerAction::Rewind => set_button(b, BTN_REWIND),
            ConsumerAction::ScanNextTrack => set_button(b, BTN_SCAN_NEXT_TRK),
            ConsumerAction::ScanPrevTrack => set_button(b, BTN_SCAN_PREV_TRK),
            ConsumerAction::Stop => set_button(b, BTN_STOP),
        }
    }

    /// Serialise into a byte slice.
    /// Returns the number of bytes written (2), or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < CONSUMER_REPORT_SIZE {
            return 0;
        }
        buf[..CONSUMER_REPORT_SIZE].copy_from_slice(&self.bytes);
        CONSUMER_REPORT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == [0; CONSUMER_REPORT_SIZE]
    }
}

/// Build a consumer report for a raw usage code into `buf`.
///
/// Unknown codes leave `buf` untouched.
pub fn build_report(buf: &mut [u8; CONSUMER_REPORT_SIZE], code: u8) {
    if let Some(action) = ConsumerAction::from_code(code) {
        let mut report = ConsumerReport { bytes: *buf };
        report.apply(action);
        *buf = report.bytes;
    }
}

// Field helpers

fn set_channel(b: &mut [u8; CONSUMER_REPORT_SIZE], value: u8) {
    b[0] = (b[0] & CHANNEL_BITS) | ((value & 0x03) << 4);
}

fn set_volume_up(b: &mut [u8; CONSUMER_REPORT_SIZE]) {
    b[0] = (b[0] & VOLUME_BITS) | 0x40;
}

fn set_volume_down(b: &mut [u8; CONSUMER_REPORT_SIZE]) {
    b[0] = (b[0] & VOLUME_BITS) | 0x80;
}

fn set_button(b: &mut [u8; CONSUMER_REPORT_SIZE], value: u8) {
    b[1] = (b[1] & BUTTON_BITS) | (value & 0x0F);
}
