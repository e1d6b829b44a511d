//! Recording [`Transport`] for unit tests.

use core::cell::{Cell, RefCell};

use heapless::Vec;

use super::{AttributeHandle, BdAddr, BondList, ConnectionId, Transport};
use crate::error::TransportError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SetDeviceName,
    ConfigureAdvertisingData(Vec<u8, 31>),
    StartAdvertising,
    Notify {
        conn: ConnectionId,
        handle: AttributeHandle,
        data: Vec<u8, 8>,
    },
    SetAttribute {
        handle: AttributeHandle,
        value: Vec<u8, 8>,
    },
    AcceptSecurity(BdAddr),
    ReplyPasskey {
        peer: BdAddr,
        accept: bool,
        passkey: u32,
    },
    BondedDevices,
    RemoveBonding(BdAddr),
}

#[derive(Default)]
pub struct MockTransport {
    pub calls: RefCell<Vec<Call, 64>>,
    pub bonds: RefCell<BondList>,
    /// Attribute values returned by `get_attribute`, keyed by handle.
    pub attributes: RefCell<Vec<(AttributeHandle, Vec<u8, 8>), 8>>,
    /// When set, every fallible call returns this error.
    pub fail_with: Cell<Option<TransportError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bonds(bonds: &[BdAddr]) -> Self {
        let mock = Self::new();
        mock.bonds.borrow_mut().extend_from_slice(bonds).unwrap();
        mock
    }

    pub fn calls(&self) -> Vec<Call, 64> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Payloads of every notification sent, in order.
    pub fn notifications(&self) -> Vec<(AttributeHandle, Vec<u8, 8>), 64> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Notify { handle, data, .. } => Some((*handle, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn set_attribute_value(&self, handle: AttributeHandle, value: &[u8]) {
        let mut attrs = self.attributes.borrow_mut();
        attrs.retain(|(h, _)| *h != handle);
        attrs
            .push((handle, Vec::from_slice(value).unwrap()))
            .unwrap();
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        self.calls.borrow_mut().push(call).unwrap();
        match self.fail_with.get() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Transport for MockTransport {
    fn set_device_name(&self, _name: &str) -> Result<(), TransportError> {
        self.record(Call::SetDeviceName)
    }

    fn configure_advertising_data(&self, data: &[u8]) -> Result<(), TransportError> {
        self.record(Call::ConfigureAdvertisingData(Vec::from_slice(data).unwrap()))
    }

    fn start_advertising(&self) -> Result<(), TransportError> {
        self.record(Call::StartAdvertising)
    }

    fn notify(
        &self,
        conn: ConnectionId,
        handle: AttributeHandle,
        data: &[u8],
    ) -> Result<(), TransportError> {
        self.record(Call::Notify {
            conn,
            handle,
            data: Vec::from_slice(data).unwrap(),
        })
    }

    fn get_attribute(
        &self,
        handle: AttributeHandle,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        if let Some(e) = self.fail_with.get() {
            return Err(e);
        }
        let attrs = self.attributes.borrow();
        let (_, value) = attrs
            .iter()
            .find(|(h, _)| *h == handle)
            .ok_or(TransportError::AttributeFailed)?;
        let n = value.len().min(buf.len());
        buf[..n].copy_from_slice(&value[..n]);
        Ok(n)
    }

    fn set_attribute(&self, handle: AttributeHandle, value: &[u8]) -> Result<(), TransportError> {
        self.record(Call::SetAttribute {
            handle,
            value: Vec::from_slice(value).unwrap(),
        })
    }

    fn accept_security_request(&self, peer: BdAddr) -> Result<(), TransportError> {
        self.record(Call::AcceptSecurity(peer))
    }

    fn reply_passkey(
        &self,
        peer: BdAddr,
        accept: bool,
        passkey: u32,
    ) -> Result<(), TransportError> {
        self.record(Call::ReplyPasskey {
            peer,
            accept,
            passkey,
        })
    }

    fn bonded_devices(&self) -> BondList {
        self.calls.borrow_mut().push(Call::BondedDevices).unwrap();
        self.bonds.borrow().clone()
    }

    fn remove_bonding(&self, peer: BdAddr) -> Result<(), TransportError> {
        self.record(Call::RemoveBonding(peer))?;
        self.bonds.borrow_mut().retain(|b| *b != peer);
        Ok(())
    }
}
