//! Connection and security lifecycle of the HID peripheral.
//!
//! ```text
//!   Idle ──advertising──► Connecting ──connect──► Connected ──auth ok──► Secured
//!    ▲                                                │                     │
//!    └──────────────────────── disconnect ────────────┴─────────────────────┘
//! ```
//!
//! Stack events enter through [`PairingStateMachine::apply_transport_event`]
//! straight from the stack's callbacks; the operator's passkey arrives
//! through the passkey queue and [`PairingStateMachine::reply_passkey`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::{adv_data, AuthMode, BdAddr, BondList, ConnectionId, Transport, TransportEvent};
use crate::config::DEVICE_NAME;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingState {
    #[default]
    Idle,
    /// Advertising, waiting for a central.
    Connecting,
    /// Connected, link not (yet) authenticated.
    Connected(ConnectionId),
    /// Connected and authenticated.
    Secured(ConnectionId),
}

/// Snapshot of the link as seen by the rest of the firmware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionState {
    pub connected: bool,
    pub connection_id: Option<ConnectionId>,
    pub securely_paired: bool,
}

#[derive(Default)]
struct Inner {
    state: PairingState,
    /// Central waiting for a passkey. A newer request replaces an older one.
    pending_passkey: Option<BdAddr>,
}

pub struct PairingStateMachine<M: RawMutex> {
    inner: Mutex<M, RefCell<Inner>>,
}

impl<M: RawMutex> PairingStateMachine<M> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                state: PairingState::Idle,
                pending_passkey: None,
            })),
        }
    }

    pub fn state(&self) -> PairingState {
        self.inner.lock(|i| i.borrow().state)
    }

    pub fn connection_state(&self) -> ConnectionState {
        match self.state() {
            PairingState::Idle | PairingState::Connecting => ConnectionState::default(),
            PairingState::Connected(id) => ConnectionState {
                connected: true,
                connection_id: Some(id),
                securely_paired: false,
            },
            PairingState::Secured(id) => ConnectionState {
                connected: true,
                connection_id: Some(id),
                securely_paired: true,
            },
        }
    }

    /// Connection to send reports on, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_state().connection_id
    }

    pub fn is_securely_paired(&self) -> bool {
        self.connection_state().securely_paired
    }

    pub fn pending_passkey(&self) -> Option<BdAddr> {
        self.inner.lock(|i| i.borrow().pending_passkey)
    }

    fn set_state(&self, state: PairingState) {
        self.inner.lock(|i| i.borrow_mut().state = state);
    }

    /// Apply one stack event. Transport failures are logged and leave the
    /// state as it was.
    pub fn apply_transport_event<T: Transport>(&self, transport: &T, event: TransportEvent) {
        match event {
            TransportEvent::RegistrationFinished { ok } => self.on_registered(transport, ok),
            TransportEvent::AdvertisingCommitted => self.start_advertising(transport),
            TransportEvent::Connected(id) => {
                info!("connected, conn id {}", id);
                self.set_state(PairingState::Connected(id));
            }
            TransportEvent::Disconnected => {
                info!("disconnected");
                self.inner.lock(|i| {
                    let mut i = i.borrow_mut();
                    i.state = PairingState::Idle;
                    i.pending_passkey = None;
                });
                self.start_advertising(transport);
            }
            TransportEvent::SecurityRequested(peer) => {
                info!("security request from {}", peer);
                if let Err(e) = transport.accept_security_request(peer) {
                    error!("security response failed: {}", e);
                }
            }
            TransportEvent::PasskeyRequested(peer) => {
                info!("central requests a passkey, reply with `p <passkey>`");
                self.inner
                    .lock(|i| i.borrow_mut().pending_passkey = Some(peer));
            }
            TransportEvent::AuthenticationCompleted {
                success,
                fail_reason,
                peer,
                mode,
            } => self.on_authenticated(transport, success, fail_reason, peer, mode),
        }
    }

    fn on_registered<T: Transport>(&self, transport: &T, ok: bool) {
        if !ok {
            error!("HID service registration failed");
            return;
        }
        if let Err(e) = transport.set_device_name(DEVICE_NAME) {
            error!("set device name failed: {}", e);
            return;
        }
        let adv = match adv_data::build(DEVICE_NAME) {
            Ok(adv) => adv,
            Err(e) => {
                error!("advertising data does not fit: {}", e);
                return;
            }
        };
        if let Err(e) = transport.configure_advertising_data(&adv) {
            error!("configure advertising data failed: {}", e);
        }
    }

    fn start_advertising<T: Transport>(&self, transport: &T) {
        match transport.start_advertising() {
            Ok(()) => {
                info!("advertising");
                self.set_state(PairingState::Connecting);
            }
            Err(e) => error!("start advertising failed: {}", e),
        }
    }

    fn on_authenticated<T: Transport>(
        &self,
        transport: &T,
        success: bool,
        fail_reason: Option<u8>,
        peer: BdAddr,
        mode: AuthMode,
    ) {
        info!("authentication completed with {}", peer);
        if success {
            info!("pair status: success, auth mode {}", mode.name());
            if !mode.meets(&AuthMode::REQUIRED) {
                warn!("link is weaker than required ({})", AuthMode::REQUIRED.name());
            }
            self.inner.lock(|i| {
                let mut i = i.borrow_mut();
                match i.state {
                    PairingState::Connected(id) | PairingState::Secured(id) => {
                        i.state = PairingState::Secured(id);
                    }
                    _ => warn!("authenticated without a connection"),
                }
            });
        } else {
            error!("pair status: fail, reason {=u8:#x}", fail_reason.unwrap_or(0));
        }
        self.list_bondings(transport);
    }

    /// Answer the outstanding passkey request with the operator's value.
    /// Without a pending request this does nothing.
    pub fn reply_passkey<T: Transport>(&self, transport: &T, passkey: u32) {
        let Some(peer) = self.pending_passkey() else {
            debug!("passkey {} with no pending request, ignored", passkey);
            return;
        };
        info!("replying with passkey {}", passkey);
        match transport.reply_passkey(peer, true, passkey) {
            Ok(()) => self.inner.lock(|i| i.borrow_mut().pending_passkey = None),
            Err(e) => error!("passkey reply failed: {}", e),
        }
    }

    /// Log and return the bonded devices.
    pub fn list_bondings<T: Transport>(&self, transport: &T) -> BondList {
        let bonds = transport.bonded_devices();
        info!("bonded devices: {}", bonds.len());
        for peer in &bonds {
            info!("  {}", peer);
        }
        bonds
    }

    /// Remove every bond. Returns how many were removed.
    pub fn delete_all_bondings<T: Transport>(&self, transport: &T) -> usize {
        let mut removed = 0;
        for peer in transport.bonded_devices() {
            match transport.remove_bonding(peer) {
                Ok(()) => removed += 1,
                Err(e) => warn!("remove bond {} failed: {}", peer, e),
            }
        }
        info!("removed {} bonds", removed);
        removed
    }
}

impl<M: RawMutex> Default for PairingStateMachine<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::ble::mock::{Call, MockTransport};
    use crate::error::TransportError;

    const PEER: BdAddr = BdAddr([0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22]);
    const OTHER: BdAddr = BdAddr([1, 2, 3, 4, 5, 6]);

    fn auth_ok() -> TransportEvent {
        TransportEvent::AuthenticationCompleted {
            success: true,
            fail_reason: None,
            peer: PEER,
            mode: AuthMode::from_bits(0x0D),
        }
    }

    fn connected(t: &MockTransport) -> PairingStateMachine<NoopRawMutex> {
        let sm = PairingStateMachine::new();
        sm.apply_transport_event(t, TransportEvent::Connected(3));
        sm
    }

    #[test]
    fn registration_configures_name_and_advertising_data() {
        let t = MockTransport::new();
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        sm.apply_transport_event(&t, TransportEvent::RegistrationFinished { ok: true });

        let calls = t.calls();
        assert_eq!(calls[0], Call::SetDeviceName);
        match &calls[1] {
            Call::ConfigureAdvertisingData(adv) => {
                assert!(adv_data::contains_hid_service_uuid(adv));
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(sm.state(), PairingState::Idle);
    }

    #[test]
    fn failed_registration_stays_idle() {
        let t = MockTransport::new();
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        sm.apply_transport_event(&t, TransportEvent::RegistrationFinished { ok: false });
        assert!(t.calls().is_empty());
        assert_eq!(sm.state(), PairingState::Idle);
    }

    #[test]
    fn committed_advertising_data_starts_advertising() {
        let t = MockTransport::new();
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        sm.apply_transport_event(&t, TransportEvent::AdvertisingCommitted);
        assert_eq!(t.calls()[..], [Call::StartAdvertising]);
        assert_eq!(sm.state(), PairingState::Connecting);
    }

    #[test]
    fn advertising_failure_leaves_state_unchanged() {
        let t = MockTransport::new();
        t.fail_with.set(Some(TransportError::AdvertisingFailed));
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        sm.apply_transport_event(&t, TransportEvent::AdvertisingCommitted);
        assert_eq!(sm.state(), PairingState::Idle);
    }

    #[test]
    fn connect_then_authenticate() {
        let t = MockTransport::with_bonds(&[PEER]);
        let sm = connected(&t);
        assert_eq!(
            sm.connection_state(),
            ConnectionState {
                connected: true,
                connection_id: Some(3),
                securely_paired: false,
            }
        );

        t.clear_calls();
        sm.apply_transport_event(&t, auth_ok());
        assert_eq!(sm.state(), PairingState::Secured(3));
        assert!(sm.is_securely_paired());
        assert_eq!(t.calls()[..], [Call::BondedDevices]);
    }

    #[test]
    fn failed_authentication_stays_unsecured() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(
            &t,
            TransportEvent::AuthenticationCompleted {
                success: false,
                fail_reason: Some(0x05),
                peer: PEER,
                mode: AuthMode::default(),
            },
        );
        assert_eq!(sm.state(), PairingState::Connected(3));
        assert!(!sm.is_securely_paired());
        assert_eq!(t.calls()[..], [Call::BondedDevices]);
    }

    #[test]
    fn authentication_without_connection_is_not_secured() {
        let t = MockTransport::new();
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        sm.apply_transport_event(&t, auth_ok());
        assert_eq!(sm.state(), PairingState::Idle);
    }

    #[test]
    fn disconnect_resets_security_and_readvertises() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(&t, auth_ok());
        sm.apply_transport_event(&t, TransportEvent::PasskeyRequested(PEER));
        t.clear_calls();

        sm.apply_transport_event(&t, TransportEvent::Disconnected);

        let state = sm.connection_state();
        assert!(!state.connected);
        assert!(!state.securely_paired);
        assert_eq!(state.connection_id, None);
        assert_eq!(sm.pending_passkey(), None);
        assert_eq!(t.calls()[..], [Call::StartAdvertising]);
    }

    #[test]
    fn security_request_is_always_accepted() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(&t, TransportEvent::SecurityRequested(PEER));
        assert_eq!(t.calls()[..], [Call::AcceptSecurity(PEER)]);
    }

    #[test]
    fn passkey_reply_goes_to_requester() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(&t, TransportEvent::PasskeyRequested(PEER));
        sm.reply_passkey(&t, 123_456);

        assert_eq!(
            t.calls()[..],
            [Call::ReplyPasskey {
                peer: PEER,
                accept: true,
                passkey: 123_456,
            }]
        );
        assert_eq!(sm.pending_passkey(), None);
    }

    #[test]
    fn second_passkey_request_overwrites_first() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(&t, TransportEvent::PasskeyRequested(OTHER));
        sm.apply_transport_event(&t, TransportEvent::PasskeyRequested(PEER));
        assert_eq!(sm.pending_passkey(), Some(PEER));
    }

    #[test]
    fn stale_passkey_is_a_no_op() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.reply_passkey(&t, 999_999);
        assert!(t.calls().is_empty());
        assert_eq!(sm.state(), PairingState::Connected(3));
    }

    #[test]
    fn failed_passkey_reply_keeps_request_pending() {
        let t = MockTransport::new();
        let sm = connected(&t);
        sm.apply_transport_event(&t, TransportEvent::PasskeyRequested(PEER));
        t.fail_with.set(Some(TransportError::SecurityFailed));
        sm.reply_passkey(&t, 1);
        assert_eq!(sm.pending_passkey(), Some(PEER));
    }

    #[test]
    fn delete_all_then_list_is_empty() {
        let t = MockTransport::with_bonds(&[PEER, OTHER]);
        let sm = PairingStateMachine::<NoopRawMutex>::new();
        assert_eq!(sm.list_bondings(&t).len(), 2);
        assert_eq!(sm.delete_all_bondings(&t), 2);
        assert!(sm.list_bondings(&t).is_empty());
        assert!(t.bonded_devices().is_empty());
    }
}
