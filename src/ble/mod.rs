//! Bluetooth Low Energy subsystem.
//!
//! The device runs in **Peripheral** role and exposes the HID-over-GATT
//! service to a single central:
//!
//! 1. **Advertising data** - raw AD payload announcing the HID service.
//! 2. **Report directory** - which GATT attribute carries which HID report
//!    in which protocol mode.
//! 3. **Pairing state machine** - connection/security lifecycle driven by
//!    [`TransportEvent`]s, including passkey entry and bond management.
//! 4. **Bond table** - keys of bonded centrals and their flash encoding.
//! 5. **Device info** - PnP ID and battery level for the companion services.
//!
//! Everything that touches the radio goes through the [`Transport`] trait,
//! implemented on target by the SoftDevice shell (`crate::nrf`, embedded
//! builds only) and in tests by a recording mock.

pub mod adv_data;
pub mod bonds;
pub mod device_info;
pub mod directory;
pub mod pairing;

#[cfg(test)]
pub(crate) mod mock;

use crate::config::{MAX_BONDED_DEVICES, SEC_BOND, SEC_MITM};
use crate::error::TransportError;

/// Link-layer connection handle.
pub type ConnectionId = u16;

/// GATT attribute handle.
pub type AttributeHandle = u16;

/// 6-byte Bluetooth device address, in the order the stack reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

/// Bonded peers as reported by the transport's bond store.
pub type BondList = heapless::Vec<BdAddr, MAX_BONDED_DEVICES>;

/// Negotiated authentication requirements (SMP AuthReq flags).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuthMode {
    pub bond: bool,
    pub mitm: bool,
    pub secure_connections: bool,
}

impl AuthMode {
    const BOND: u8 = 0x01;
    const MITM: u8 = 0x04;
    const SC: u8 = 0x08;

    /// Decode an SMP AuthReq byte. Bits other than bonding, MITM and SC
    /// are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            bond: bits & Self::BOND != 0,
            mitm: bits & Self::MITM != 0,
            secure_connections: bits & Self::SC != 0,
        }
    }

    /// Protection the device asks for when pairing. LE Secure Connections
    /// is negotiated by the stack and not required.
    pub const REQUIRED: AuthMode = AuthMode {
        bond: SEC_BOND,
        mitm: SEC_MITM,
        secure_connections: false,
    };

    /// True if every flag set in `required` is also set here.
    pub const fn meets(&self, required: &AuthMode) -> bool {
        (self.bond || !required.bond)
            && (self.mitm || !required.mitm)
            && (self.secure_connections || !required.secure_connections)
    }

    pub const fn bits(&self) -> u8 {
        (if self.bond { Self::BOND } else { 0 })
            | (if self.mitm { Self::MITM } else { 0 })
            | (if self.secure_connections { Self::SC } else { 0 })
    }

    pub const fn name(&self) -> &'static str {
        match (self.secure_connections, self.mitm, self.bond) {
            (false, false, false) => "NO_BOND",
            (false, false, true) => "BOND",
            (false, true, false) => "MITM",
            (false, true, true) => "BOND_MITM",
            (true, false, false) => "SC_ONLY",
            (true, false, true) => "SC_BOND",
            (true, true, false) => "SC_MITM",
            (true, true, true) => "SC_MITM_BOND",
        }
    }
}

/// Events the BLE stack reports to the pairing state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent {
    /// GATT HID service registration finished.
    RegistrationFinished { ok: bool },
    /// The advertising payload was accepted by the stack.
    AdvertisingCommitted,
    /// A central connected.
    Connected(ConnectionId),
    /// The central disconnected (or the link was lost).
    Disconnected,
    /// The central asked us to secure the link.
    SecurityRequested(BdAddr),
    /// Passkey entry: the central displays a passkey the operator must type.
    PasskeyRequested(BdAddr),
    /// Pairing finished, successfully or not.
    AuthenticationCompleted {
        success: bool,
        fail_reason: Option<u8>,
        peer: BdAddr,
        mode: AuthMode,
    },
}

/// Narrow interface to the BLE stack.
///
/// All methods take `&self`: the transport is shared between the dispatch
/// task and the stack's security callbacks.
pub trait Transport {
    fn set_device_name(&self, name: &str) -> Result<(), TransportError>;

    /// Hand the raw AD payload to the stack. The stack answers with
    /// [`TransportEvent::AdvertisingCommitted`].
    fn configure_advertising_data(&self, data: &[u8]) -> Result<(), TransportError>;

    fn start_advertising(&self) -> Result<(), TransportError>;

    /// Send `data` as a notification of `handle` on connection `conn`.
    fn notify(
        &self,
        conn: ConnectionId,
        handle: AttributeHandle,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Read an attribute value into `buf`, returning the length read.
    fn get_attribute(&self, handle: AttributeHandle, buf: &mut [u8])
        -> Result<usize, TransportError>;

    fn set_attribute(&self, handle: AttributeHandle, value: &[u8]) -> Result<(), TransportError>;

    fn accept_security_request(&self, peer: BdAddr) -> Result<(), TransportError>;

    fn reply_passkey(&self, peer: BdAddr, accept: bool, passkey: u32)
        -> Result<(), TransportError>;

    fn bonded_devices(&self) -> BondList;

    fn remove_bonding(&self, peer: BdAddr) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_names_match_smp_bits() {
        assert_eq!(AuthMode::from_bits(0x00).name(), "NO_BOND");
        assert_eq!(AuthMode::from_bits(0x01).name(), "BOND");
        assert_eq!(AuthMode::from_bits(0x05).name(), "BOND_MITM");
        assert_eq!(AuthMode::from_bits(0x08).name(), "SC_ONLY");
        assert_eq!(AuthMode::from_bits(0x0D).name(), "SC_MITM_BOND");
    }

    #[test]
    fn auth_mode_ignores_keypress_and_reserved_bits() {
        let mode = AuthMode::from_bits(0xFD);
        assert_eq!(mode.bits(), 0x0D);
    }

    #[test]
    fn just_works_link_misses_mitm_requirement() {
        let required = AuthMode::from_bits(0x05);
        assert!(!AuthMode::from_bits(0x01).meets(&required));
        assert!(AuthMode::from_bits(0x05).meets(&required));
        assert!(AuthMode::from_bits(0x0D).meets(&required));
        assert!(AuthMode::default().meets(&AuthMode::default()));
    }

    #[test]
    fn passkey_pairing_meets_configured_policy() {
        // Bond + MITM + SC, as negotiated with a keyboard-only peripheral.
        assert!(AuthMode::from_bits(0x0D).meets(&AuthMode::REQUIRED));
    }
}
