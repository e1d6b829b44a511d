//! Raw advertising payload for the HID peripheral, and helpers to read
//! AD structures back out of a payload.
//!
//! Every AD structure is `[len, type, data...]` where `len` counts the type
//! byte plus the data.

use heapless::{String, Vec};

use crate::config::{
    ADV_INCLUDE_TX_POWER, ADV_TX_POWER_DBM, APPEARANCE_HID_GENERIC, CONN_INTERVAL_MAX,
    CONN_INTERVAL_MIN,
};
use crate::error::Error;

/// Legacy advertising payload limit.
pub const ADV_DATA_MAX: usize = 31;

/// HID service UUID.
pub const HID_SERVICE_UUID: u16 = 0x1812;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_GENERAL_DISC_LE_ONLY: u8 = 0x06;

const AD_FLAGS: u8 = 0x01;
const AD_UUID16_INCOMPLETE: u8 = 0x02;
const AD_UUID16_COMPLETE: u8 = 0x03;
const AD_NAME_SHORT: u8 = 0x08;
const AD_NAME_COMPLETE: u8 = 0x09;
const AD_TX_POWER: u8 = 0x0A;
const AD_CONN_INTERVAL_RANGE: u8 = 0x12;
const AD_APPEARANCE: u8 = 0x19;

pub type AdvData = Vec<u8, ADV_DATA_MAX>;

/// Build the HID advertising payload: flags, TX power, appearance, HID
/// service UUID, preferred connection interval and the device name.
///
/// A name that does not fit is cut down and sent as a shortened local name.
pub fn build(name: &str) -> Result<AdvData, Error> {
    let mut adv = AdvData::new();

    push_ad(&mut adv, AD_FLAGS, &[FLAGS_GENERAL_DISC_LE_ONLY])?;
    if ADV_INCLUDE_TX_POWER {
        push_ad(&mut adv, AD_TX_POWER, &[ADV_TX_POWER_DBM as u8])?;
    }
    push_ad(&mut adv, AD_APPEARANCE, &APPEARANCE_HID_GENERIC.to_le_bytes())?;
    push_ad(&mut adv, AD_UUID16_COMPLETE, &HID_SERVICE_UUID.to_le_bytes())?;

    let min = CONN_INTERVAL_MIN.to_le_bytes();
    let max = CONN_INTERVAL_MAX.to_le_bytes();
    push_ad(
        &mut adv,
        AD_CONN_INTERVAL_RANGE,
        &[min[0], min[1], max[0], max[1]],
    )?;

    let room = ADV_DATA_MAX.saturating_sub(adv.len() + 2);
    if name.len() <= room {
        push_ad(&mut adv, AD_NAME_COMPLETE, name.as_bytes())?;
    } else if room > 0 {
        push_ad(&mut adv, AD_NAME_SHORT, &name.as_bytes()[..room])?;
    }

    Ok(adv)
}

fn push_ad(adv: &mut AdvData, ad_type: u8, data: &[u8]) -> Result<(), Error> {
    let len = u8::try_from(data.len() + 1).map_err(|_| Error::BufferOverflow)?;
    adv.push(len).map_err(|_| Error::BufferOverflow)?;
    adv.push(ad_type).map_err(|_| Error::BufferOverflow)?;
    adv.extend_from_slice(data).map_err(|_| Error::BufferOverflow)
}

/// Iterate `(type, data)` pairs of a payload, stopping at the first
/// malformed structure.
fn structures<'a>(data: &'a [u8]) -> impl Iterator<Item = (u8, &'a [u8])> + 'a {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad = (data[i + 1], &data[i + 2..i + 1 + len]);
        i += len + 1;
        Some(ad)
    })
}

/// Check if raw advertisement data contains the HID Service UUID (0x1812).
pub fn contains_hid_service_uuid(data: &[u8]) -> bool {
    let hid_uuid_le = HID_SERVICE_UUID.to_le_bytes();

    structures(data)
        .filter(|(ty, _)| *ty == AD_UUID16_INCOMPLETE || *ty == AD_UUID16_COMPLETE)
        .any(|(_, uuids)| uuids.chunks_exact(2).any(|c| c == hid_uuid_le))
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> Option<String<32>> {
    let (_, name_bytes) = structures(data)
        .find(|(ty, _)| *ty == AD_NAME_SHORT || *ty == AD_NAME_COMPLETE)?;

    let mut name = String::new();
    for &b in name_bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    Some(name)
}

/// Extract the flags byte, if present.
pub fn extract_flags(data: &[u8]) -> Option<u8> {
    structures(data)
        .find(|(ty, _)| *ty == AD_FLAGS)
        .and_then(|(_, d)| d.first().copied())
}
