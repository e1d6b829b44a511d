//! Values served by the Device Information and Battery services that
//! HID-over-GATT hosts read alongside the HID service.

use crate::config::{
    BATTERY_LEVEL_PERCENT, PNP_PRODUCT_ID, PNP_PRODUCT_VERSION, PNP_VENDOR_ID,
    PNP_VENDOR_ID_SOURCE,
};

/// Size of the PnP ID characteristic (0x2A50).
pub const PNP_ID_SIZE: usize = 7;

/// PnP ID characteristic value: `[source][vendor LE][product LE][version LE]`.
pub const fn pnp_id(source: u8, vendor: u16, product: u16, version: u16) -> [u8; PNP_ID_SIZE] {
    let v = vendor.to_le_bytes();
    let p = product.to_le_bytes();
    let r = version.to_le_bytes();
    [source, v[0], v[1], p[0], p[1], r[0], r[1]]
}

/// PnP ID of this device.
pub const PNP_ID: [u8; PNP_ID_SIZE] = pnp_id(
    PNP_VENDOR_ID_SOURCE,
    PNP_VENDOR_ID,
    PNP_PRODUCT_ID,
    PNP_PRODUCT_VERSION,
);

/// Battery Level characteristic value, clamped to 0..=100 %.
pub const fn battery_level() -> u8 {
    if BATTERY_LEVEL_PERCENT > 100 {
        100
    } else {
        BATTERY_LEVEL_PERCENT
    }
}
