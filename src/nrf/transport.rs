//! [`Transport`] over the Nordic SoftDevice, and the security handler that
//! turns SoftDevice pairing callbacks into [`TransportEvent`]s.

use core::cell::RefCell;

use defmt::Debug2Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    gatt_server, Address, AddressType, Connection, EncryptionInfo, IdentityKey, MasterId,
    PasskeyReply, SecurityMode,
};
use nrf_softdevice::{raw, Softdevice};

use crate::ble::adv_data::AdvData;
use crate::ble::bonds::{BondRecord, BondTable};
use crate::ble::pairing::PairingStateMachine;
use crate::ble::{
    AttributeHandle, AuthMode, BdAddr, BondList, ConnectionId, Transport, TransportEvent,
};
use crate::config::{SEC_BOND, SEC_MITM};
use crate::error::TransportError;

type Shared<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

pub struct SoftdeviceTransport {
    sd: &'static Softdevice,
    conn: Shared<Option<Connection>>,
    adv_data: Shared<AdvData>,
    passkey: Shared<Option<PasskeyReply>>,
    bonds: Shared<BondTable>,
    /// Raised when a new advertising payload was configured.
    pub(crate) adv_configured: Signal<CriticalSectionRawMutex, ()>,
    /// Raised when advertising should (re)start.
    pub(crate) adv_start: Signal<CriticalSectionRawMutex, ()>,
    /// Raised when the bond table needs to be written to flash.
    pub(crate) bonds_changed: Signal<CriticalSectionRawMutex, ()>,
}

impl SoftdeviceTransport {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self {
            sd,
            conn: Mutex::new(RefCell::new(None)),
            adv_data: Mutex::new(RefCell::new(AdvData::new())),
            passkey: Mutex::new(RefCell::new(None)),
            bonds: Mutex::new(RefCell::new(BondTable::new())),
            adv_configured: Signal::new(),
            adv_start: Signal::new(),
            bonds_changed: Signal::new(),
        }
    }

    pub(crate) fn advertising_data(&self) -> AdvData {
        self.adv_data.lock(|d| d.borrow().clone())
    }

    pub(crate) fn attach(&self, conn: Connection) {
        self.conn.lock(|c| c.replace(Some(conn)));
    }

    pub(crate) fn detach(&self) {
        self.conn.lock(|c| c.replace(None));
        // A pending passkey request dies with its link.
        self.passkey.lock(|p| p.replace(None));
    }

    pub(crate) fn peer(&self) -> BdAddr {
        self.conn.lock(|c| {
            c.borrow()
                .as_ref()
                .map(|conn| BdAddr(conn.peer_address().bytes()))
                .unwrap_or_default()
        })
    }

    pub(crate) fn with_bonds<R>(&self, f: impl FnOnce(&mut BondTable) -> R) -> R {
        self.bonds.lock(|b| f(&mut b.borrow_mut()))
    }
}

impl Transport for SoftdeviceTransport {
    fn set_device_name(&self, name: &str) -> Result<(), TransportError> {
        // Zeroed write permission: the name is not writable by the central.
        let write_perm: raw::ble_gap_conn_sec_mode_t = unsafe { core::mem::zeroed() };
        let ret = unsafe {
            raw::sd_ble_gap_device_name_set(&write_perm, name.as_ptr(), name.len() as u16)
        };
        match ret {
            raw::NRF_SUCCESS => Ok(()),
            err => Err(TransportError::Raw(err)),
        }
    }

    fn configure_advertising_data(&self, data: &[u8]) -> Result<(), TransportError> {
        let data = AdvData::from_slice(data).map_err(|_| TransportError::AdvertisingFailed)?;
        self.adv_data.lock(|d| d.replace(data));
        self.adv_configured.signal(());
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), TransportError> {
        if self.conn.lock(|c| c.borrow().is_some()) {
            return Err(TransportError::AdvertisingFailed);
        }
        self.adv_start.signal(());
        Ok(())
    }

    fn notify(
        &self,
        conn: ConnectionId,
        handle: AttributeHandle,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.conn.lock(|c| {
            let c = c.borrow();
            let link = c
                .as_ref()
                .filter(|link| link.handle() == Some(conn))
                .ok_or(TransportError::NotConnected)?;
            gatt_server::notify_value(link, handle, data).map_err(|e| {
                warn!("notify on handle {} failed: {:?}", handle, Debug2Format(&e));
                TransportError::NotifyFailed
            })
        })
    }

    fn get_attribute(
        &self,
        handle: AttributeHandle,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        gatt_server::get_value(self.sd, handle, buf).map_err(|_| TransportError::AttributeFailed)
    }

    fn set_attribute(&self, handle: AttributeHandle, value: &[u8]) -> Result<(), TransportError> {
        gatt_server::set_value(self.sd, handle, value).map_err(|_| TransportError::AttributeFailed)
    }

    /// Ask the central to secure the link. The SoftDevice answers the
    /// resulting pairing request itself, using [`Bonder`]'s IO capabilities.
    fn accept_security_request(&self, peer: BdAddr) -> Result<(), TransportError> {
        self.conn.lock(|c| {
            let c = c.borrow();
            let link = c.as_ref().ok_or(TransportError::NotConnected)?;
            debug!("requesting security from {}", peer.0);
            link.request_security()
                .map_err(|_| TransportError::SecurityFailed)
        })
    }

    fn reply_passkey(
        &self,
        peer: BdAddr,
        accept: bool,
        passkey: u32,
    ) -> Result<(), TransportError> {
        let reply = self
            .passkey
            .lock(|p| p.borrow_mut().take())
            .ok_or(TransportError::SecurityFailed)?;

        let digits = passkey_digits(passkey);
        debug!("passkey reply for {}, accept {}", peer.0, accept);
        reply
            .reply(accept.then_some(&digits))
            .map_err(|_| TransportError::SecurityFailed)
    }

    fn bonded_devices(&self) -> BondList {
        self.with_bonds(|b| b.addresses())
    }

    fn remove_bonding(&self, peer: BdAddr) -> Result<(), TransportError> {
        if self.with_bonds(|b| b.remove(&peer)) {
            self.bonds_changed.signal(());
            Ok(())
        } else {
            Err(TransportError::BondStoreFailed)
        }
    }
}

/// Six ASCII digits, zero padded, as the SoftDevice expects.
fn passkey_digits(passkey: u32) -> [u8; 6] {
    let mut digits = [b'0'; 6];
    let mut v = passkey % 1_000_000;
    for d in digits.iter_mut().rev() {
        *d = b'0' + (v % 10) as u8;
        v /= 10;
    }
    digits
}

fn address_kind(addr: &Address) -> u8 {
    match addr.address_type() {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    }
}

/// Security callbacks from the SoftDevice.
pub struct Bonder {
    transport: &'static SoftdeviceTransport,
    pairing: &'static PairingStateMachine<CriticalSectionRawMutex>,
}

impl Bonder {
    pub fn new(
        transport: &'static SoftdeviceTransport,
        pairing: &'static PairingStateMachine<CriticalSectionRawMutex>,
    ) -> Self {
        Self { transport, pairing }
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        if SEC_MITM {
            IoCapabilities::KeyboardOnly
        } else {
            IoCapabilities::None
        }
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        SEC_BOND
    }

    fn enter_passkey(&self, reply: PasskeyReply) {
        self.transport.passkey.lock(|p| p.replace(Some(reply)));
        let peer = self.transport.peer();
        self.pairing
            .apply_transport_event(self.transport, TransportEvent::PasskeyRequested(peer));
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        let record = BondRecord {
            addr: BdAddr(peer_id.addr.bytes()),
            addr_kind: address_kind(&peer_id.addr),
            ediv: master_id.ediv,
            rand: master_id.rand,
            ltk: key.ltk,
            ltk_flags: key.flags,
            irk: peer_id.irk.as_raw().irk,
        };
        info!("bonded with {}", conn.peer_address());
        self.transport.with_bonds(|b| b.add(record));
        self.transport.bonds_changed.signal(());
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.transport.with_bonds(|b| {
            b.find_by_master(master_id.ediv, &master_id.rand)
                .map(|r| EncryptionInfo {
                    ltk: r.ltk,
                    flags: r.ltk_flags,
                })
        })
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("security mode updated: {}", mode);

        // The SoftDevice only reports successful encryption here; a failed
        // pairing ends in a disconnect instead.
        let mitm = match mode {
            SecurityMode::NoAccess | SecurityMode::Open => return,
            SecurityMode::JustWorks | SecurityMode::Signed => false,
            _ => true,
        };
        let peer = BdAddr(conn.peer_address().bytes());
        let bonded = self.transport.with_bonds(|b| b.find_by_addr(&peer).is_some());
        let mode = AuthMode {
            bond: bonded,
            mitm,
            secure_connections: matches!(mode, SecurityMode::LescMitm),
        };

        self.pairing.apply_transport_event(
            self.transport,
            TransportEvent::AuthenticationCompleted {
                success: true,
                fail_reason: None,
                peer,
                mode,
            },
        );
    }
}
