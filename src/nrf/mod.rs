//! nRF52840 + S140 SoftDevice shell.
//!
//! Owns everything that touches the radio, flash and UART:
//!
//! 1. **Server** - HID-over-GATT service registration.
//! 2. **Transport** - [`crate::ble::Transport`] over the SoftDevice plus the
//!    security handler feeding the pairing state machine.
//! 3. **Bonds** - bond table persistence in internal flash.
//! 4. **Console UART** - line reader for the operator console.
//!
//! The host-independent core is driven from the task bodies below; `main`
//! only wires statics and spawns them.

pub mod bonds;
pub mod console_uart;
pub mod server;
pub mod transport;

use core::mem;

use defmt::Debug2Format;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::ble::peripheral::{self, advertise_pairable, ConnectableAdvertisement};
use nrf_softdevice::{raw, Flash, Softdevice};

use self::server::{BatteryServiceEvent, HidServiceEvent, Server, ServerEvent};
use self::transport::{Bonder, SoftdeviceTransport};
use crate::ble::directory::ReportDirectory;
use crate::ble::pairing::PairingStateMachine;
use crate::ble::{BdAddr, TransportEvent};
use crate::config::{ADV_INTERVAL, DEVICE_NAME};
use crate::hid::ProtocolMode;

type Pairing = PairingStateMachine<CriticalSectionRawMutex>;
type Directory = ReportDirectory<CriticalSectionRawMutex>;

/// Delay before retrying after advertising could not be started.
const ADV_RETRY: Duration = Duration::from_secs(1);

/// SoftDevice configuration: one peripheral link, device name held by the
/// stack so it can be changed at runtime.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: 32,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// Advertise whenever the pairing state machine asks for it, and serve the
/// GATT server while a central is connected.
pub async fn ble_task(
    sd: &'static Softdevice,
    server: &'static Server,
    transport: &'static SoftdeviceTransport,
    bonder: &'static Bonder,
    pairing: &'static Pairing,
    directory: &'static Directory,
) -> ! {
    loop {
        match select(transport.adv_configured.wait(), transport.adv_start.wait()).await {
            Either::First(()) => {
                pairing.apply_transport_event(transport, TransportEvent::AdvertisingCommitted)
            }
            Either::Second(()) => {
                advertise_and_serve(sd, server, transport, bonder, pairing, directory).await
            }
        }
    }
}

async fn advertise_and_serve(
    sd: &'static Softdevice,
    server: &'static Server,
    transport: &'static SoftdeviceTransport,
    bonder: &'static Bonder,
    pairing: &'static Pairing,
    directory: &'static Directory,
) {
    let adv_data = transport.advertising_data();
    let advertisement = ConnectableAdvertisement::ScannableUndirected {
        adv_data: &adv_data,
        scan_data: &[],
    };
    let config = peripheral::Config {
        interval: u32::from(ADV_INTERVAL),
        ..Default::default()
    };

    let conn = match advertise_pairable(sd, advertisement, &config, bonder).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("advertising failed: {:?}", Debug2Format(&e));
            Timer::after(ADV_RETRY).await;
            transport.adv_start.signal(());
            return;
        }
    };
    let Some(id) = conn.handle() else {
        return;
    };

    info!("central connected: {}", conn.peer_address());
    let peer = BdAddr(conn.peer_address().bytes());
    transport.attach(conn.clone());
    pairing.apply_transport_event(transport, TransportEvent::Connected(id));
    pairing.apply_transport_event(transport, TransportEvent::SecurityRequested(peer));

    let reason = gatt_server::run(&conn, server, |event| match event {
        ServerEvent::Hid(HidServiceEvent::ProtocolMode(mode)) => {
            directory.set_protocol_mode(mode);
        }
        ServerEvent::Hid(HidServiceEvent::Leds(leds)) => {
            info!("host LEDs: {=u8:#x}", leds);
        }
        ServerEvent::Hid(HidServiceEvent::ControlPoint(v)) => {
            info!("HID control point: {}", if v == 0 { "suspend" } else { "exit suspend" });
        }
        ServerEvent::Hid(HidServiceEvent::CccdWrite {
            handle,
            notifications,
        }) => {
            info!("CCCD {} notifications: {}", handle, notifications);
        }
        ServerEvent::Bas(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) => {
            debug!("battery level notifications: {}", notifications);
        }
        ServerEvent::Dis(e) => match e {},
    })
    .await;
    info!("central disconnected: {:?}", Debug2Format(&reason));

    transport.detach();
    // The host selects the protocol again on every connection.
    directory.set_protocol_mode(ProtocolMode::Report);
    pairing.apply_transport_event(transport, TransportEvent::Disconnected);
}

/// Load bonds from flash, then save them whenever they change.
pub async fn bond_store_task(sd: &'static Softdevice, transport: &'static SoftdeviceTransport) -> ! {
    let mut flash = Flash::take(sd);
    if bonds::load(&mut flash, transport).await.is_err() {
        warn!("starting with an empty bond table");
    }

    loop {
        transport.bonds_changed.wait().await;
        let _ = bonds::save(&mut flash, transport).await;
    }
}
