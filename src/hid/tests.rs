//! Unit tests for HID report encoding and the report map.
//!
//! These tests run on the host (not embedded) and verify the pure
//! byte layouts the GATT HID service sends to the host.

use super::consumer::{ConsumerAction, ConsumerReport};
use super::keyboard::{KeyboardReport, MOD_LEFT_SHIFT};
use super::mouse::{MouseReport, BUTTON_LEFT};
use super::report_map::REPORT_MAP;
use super::{HidReport, ProtocolMode};

// ═══════════════════════════════════════════════════════════════════════════
// Keyboard Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn keyboard_report_released() {
    let report = KeyboardReport::released();
    assert!(report.is_released());
    assert_eq!(report.encode(), [0x00, 0x00]);
}

#[test]
fn keyboard_report_shift_a() {
    // Modifier: Left Shift (0x02), Key: 'a' (0x04)
    let report = KeyboardReport::new(0x02, 0x04);
    assert_eq!(report.encode(), [0x02, 0x04]);
    assert!(!report.is_released());
}

#[test]
fn keyboard_report_for_upper_case_char() {
    let report = KeyboardReport::for_char('A').unwrap();
    assert_eq!(report, KeyboardReport::new(MOD_LEFT_SHIFT, 0x04));
}

#[test]
fn keyboard_report_serialize_buffer_too_small() {
    let report = KeyboardReport::new(0, 0x04);
    let mut small_buf = [0u8; 1];
    assert_eq!(report.serialize(&mut small_buf), 0);
}

#[test]
fn keyboard_report_boot_layout() {
    let report = KeyboardReport::new(0x01, 0x1E);
    let mut buf = [0xFFu8; 8];
    let written = report.serialize_boot(&mut buf);

    assert_eq!(written, 8);
    assert_eq!(buf, [0x01, 0x00, 0x1E, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Mouse Report Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn mouse_report_left_click_with_motion() {
    // Left button, X=-5, Y=10
    let report = MouseReport::new(BUTTON_LEFT, -5, 10);
    assert_eq!(report.encode(), [0x01, 0xFB, 0x0A]);
}

#[test]
fn mouse_report_idle() {
    assert!(MouseReport::default().is_idle());
    assert!(!MouseReport::new(0, 1, 0).is_idle());
}

#[test]
fn mouse_report_extremes_wrap_as_twos_complement() {
    let report = MouseReport::new(0xFF, i8::MIN, i8::MAX);
    assert_eq!(report.encode(), [0xFF, 0x80, 0x7F]);
}

#[test]
fn mouse_report_serialize_buffer_too_small() {
    let report = MouseReport::new(0, 1, 1);
    let mut buf = [0u8; 2];
    assert_eq!(report.serialize(&mut buf), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// HidReport Enum Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn hid_report_keyboard_depends_on_protocol_mode() {
    let report = HidReport::Keyboard(KeyboardReport::new(0x02, 0x04));
    let mut buf = [0u8; 8];

    assert_eq!(report.serialize(ProtocolMode::Report, &mut buf), 2);
    assert_eq!(&buf[..2], &[0x02, 0x04]);

    assert_eq!(report.serialize(ProtocolMode::Boot, &mut buf), 8);
    assert_eq!(buf, [0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn hid_report_mouse_same_in_both_modes() {
    let report = HidReport::Mouse(MouseReport::new(0x02, 10, -10));
    let mut report_buf = [0u8; 8];
    let mut boot_buf = [0u8; 8];

    assert_eq!(report.serialize(ProtocolMode::Report, &mut report_buf), 3);
    assert_eq!(report.serialize(ProtocolMode::Boot, &mut boot_buf), 3);
    assert_eq!(report_buf, boot_buf);
}

#[test]
fn hid_report_ids() {
    assert_eq!(HidReport::Mouse(MouseReport::default()).report_id(), 1);
    assert_eq!(HidReport::Keyboard(KeyboardReport::released()).report_id(), 2);
    let cc = HidReport::Consumer(ConsumerReport::new(ConsumerAction::Mute));
    assert_eq!(cc.report_id(), 3);
}

#[test]
fn protocol_mode_from_byte() {
    assert_eq!(ProtocolMode::from_byte(0), ProtocolMode::Boot);
    assert_eq!(ProtocolMode::from_byte(1), ProtocolMode::Report);
    assert_eq!(ProtocolMode::default(), ProtocolMode::Report);
}

// ═══════════════════════════════════════════════════════════════════════════
// Report Map Tests
// ═══════════════════════════════════════════════════════════════════════════

/// Walk the short items of a report descriptor, calling `f(tag, data)`.
fn walk_items(desc: &[u8], mut f: impl FnMut(u8, &[u8])) {
    let mut i = 0;
    while i < desc.len() {
        let prefix = desc[i];
        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        assert!(i + 1 + size <= desc.len(), "truncated item at {}", i);
        f(prefix & 0xFC, &desc[i + 1..i + 1 + size]);
        i += 1 + size;
    }
}

#[test]
fn report_map_collections_balance() {
    let mut depth = 0i32;
    walk_items(REPORT_MAP, |tag, _| match tag {
        0xA0 => depth += 1,
        0xC0 => {
            depth -= 1;
            assert!(depth >= 0);
        }
        _ => {}
    });
    assert_eq!(depth, 0);
}

#[test]
fn report_map_declares_all_report_ids() {
    let mut ids = heapless::Vec::<u8, 8>::new();
    walk_items(REPORT_MAP, |tag, data| {
        if tag == 0x84 {
            ids.push(data[0]).unwrap();
        }
    });
    assert_eq!(&ids[..], &[1, 2, 3]);
}

#[test]
fn report_map_input_bits_match_encoders() {
    // Sum Report Size × Report Count of every Input item per report ID.
    let mut bits = [0u32; 4];
    let (mut id, mut size, mut count) = (0usize, 0u32, 0u32);
    walk_items(REPORT_MAP, |tag, data| match tag {
        0x84 => id = data[0] as usize,
        0x74 => size = data[0] as u32,
        0x94 => count = data[0] as u32,
        0x80 => bits[id] += size * count,
        _ => {}
    });
    assert_eq!(bits[1], 3 * 8);
    assert_eq!(bits[2], 2 * 8);
    assert_eq!(bits[3], 2 * 8);
}
