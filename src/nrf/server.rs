//! GATT server: the HID-over-GATT service built with the SoftDevice
//! service builder, plus the Device Information and Battery services
//! HOGP hosts expect next to it.
//!
//! One Report characteristic (0x2A4D) per report ID/type, each tagged with
//! a Report Reference descriptor (0x2908), plus the boot keyboard / boot
//! mouse characteristics the host uses in boot protocol mode.

use defmt::Format;
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{CharacteristicHandles, RegisterError, Service};
use nrf_softdevice::ble::{SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

use crate::ble::device_info::PNP_ID;
use crate::ble::directory::HidHandles;
use crate::config::{MANUFACTURER_NAME, SEC_MITM};
use crate::hid::consumer::CONSUMER_REPORT_SIZE;
use crate::hid::keyboard::{BOOT_KEYBOARD_REPORT_SIZE, KEYBOARD_REPORT_SIZE};
use crate::hid::mouse::MOUSE_REPORT_SIZE;
use crate::hid::report_map::REPORT_MAP;
use crate::hid::{
    ProtocolMode, ReportType, REPORT_ID_CONSUMER_IN, REPORT_ID_KEYBOARD_IN, REPORT_ID_LEDS_OUT,
    REPORT_ID_MOUSE_IN,
};

const DEVICE_INFORMATION_SERVICE: Uuid = Uuid::new_16(0x180a);
const MANUFACTURER_NAME_CHAR: Uuid = Uuid::new_16(0x2a29);
const PNP_ID_CHAR: Uuid = Uuid::new_16(0x2a50);

const HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const HID_INFORMATION: Uuid = Uuid::new_16(0x2a4a);
const REPORT_MAP_CHAR: Uuid = Uuid::new_16(0x2a4b);
const HID_CONTROL_POINT: Uuid = Uuid::new_16(0x2a4c);
const REPORT: Uuid = Uuid::new_16(0x2a4d);
const PROTOCOL_MODE: Uuid = Uuid::new_16(0x2a4e);
const BOOT_KEYBOARD_INPUT: Uuid = Uuid::new_16(0x2a22);
const BOOT_KEYBOARD_OUTPUT: Uuid = Uuid::new_16(0x2a32);
const BOOT_MOUSE_INPUT: Uuid = Uuid::new_16(0x2a33);
const REPORT_REFERENCE: Uuid = Uuid::new_16(0x2908);

/// Reports are only readable on an authenticated (passkey) link.
const SECURITY: SecurityMode = if SEC_MITM {
    SecurityMode::Mitm
} else {
    SecurityMode::JustWorks
};

pub struct HidService {
    handles: HidHandles,
    protocol_mode: u16,
    control_point: u16,
}

#[derive(Format)]
pub enum HidServiceEvent {
    ProtocolMode(ProtocolMode),
    ControlPoint(u8),
    /// Host wrote the keyboard LED state (report or boot characteristic).
    Leds(u8),
    CccdWrite { handle: u16, notifications: bool },
}

impl HidService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, HID_SERVICE)?;

        #[rustfmt::skip]
        let _hid_information = sb.add_characteristic(
            HID_INFORMATION,
            Attribute::new([
                0x11, 0x01, // bcdHID 1.11
                0x00,       // country code
                0b10,       // normally connectable
            ]).read_security(SECURITY),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        let _report_map = sb.add_characteristic(
            REPORT_MAP_CHAR,
            Attribute::new(REPORT_MAP).read_security(SECURITY),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        let protocol_mode = sb
            .add_characteristic(
                PROTOCOL_MODE,
                Attribute::new([ProtocolMode::Report as u8]).security(SECURITY),
                Metadata::new(Properties::new().read().write_without_response()),
            )?
            .build();

        let control_point = sb
            .add_characteristic(
                HID_CONTROL_POINT,
                Attribute::new([0u8]).write_security(SECURITY),
                Metadata::new(Properties::new().write_without_response()),
            )?
            .build();

        let mouse_in = input_report(&mut sb, REPORT_ID_MOUSE_IN, [0u8; MOUSE_REPORT_SIZE])?;
        let keyboard_in =
            input_report(&mut sb, REPORT_ID_KEYBOARD_IN, [0u8; KEYBOARD_REPORT_SIZE])?;
        let leds_out = output_report(&mut sb, REPORT_ID_LEDS_OUT)?;
        let consumer_in =
            input_report(&mut sb, REPORT_ID_CONSUMER_IN, [0u8; CONSUMER_REPORT_SIZE])?;

        let boot_keyboard_in = sb
            .add_characteristic(
                BOOT_KEYBOARD_INPUT,
                Attribute::new([0u8; BOOT_KEYBOARD_REPORT_SIZE]).security(SECURITY),
                Metadata::with_security(Properties::new().read().notify(), SECURITY),
            )?
            .build();
        let boot_keyboard_out = sb
            .add_characteristic(
                BOOT_KEYBOARD_OUTPUT,
                Attribute::new([0u8]).security(SECURITY),
                Metadata::new(Properties::new().read().write().write_without_response()),
            )?
            .build();
        let boot_mouse_in = sb
            .add_characteristic(
                BOOT_MOUSE_INPUT,
                Attribute::new([0u8; MOUSE_REPORT_SIZE]).security(SECURITY),
                Metadata::with_security(Properties::new().read().notify(), SECURITY),
            )?
            .build();

        sb.build();

        let handles = HidHandles {
            mouse_in: mouse_in.value_handle,
            mouse_in_cccd: mouse_in.cccd_handle,
            keyboard_in: keyboard_in.value_handle,
            keyboard_in_cccd: keyboard_in.cccd_handle,
            leds_out: leds_out.value_handle,
            consumer_in: consumer_in.value_handle,
            consumer_in_cccd: consumer_in.cccd_handle,
            boot_keyboard_in: boot_keyboard_in.value_handle,
            boot_keyboard_in_cccd: boot_keyboard_in.cccd_handle,
            boot_keyboard_out: boot_keyboard_out.value_handle,
            boot_mouse_in: boot_mouse_in.value_handle,
            boot_mouse_in_cccd: boot_mouse_in.cccd_handle,
        };
        info!("HID service registered, report map {} bytes", REPORT_MAP.len());

        Ok(Self {
            handles,
            protocol_mode: protocol_mode.value_handle,
            control_point: control_point.value_handle,
        })
    }

    pub fn handles(&self) -> HidHandles {
        self.handles
    }

    fn is_cccd(&self, handle: u16) -> bool {
        let h = &self.handles;
        [
            h.mouse_in_cccd,
            h.keyboard_in_cccd,
            h.consumer_in_cccd,
            h.boot_keyboard_in_cccd,
            h.boot_mouse_in_cccd,
        ]
        .contains(&handle)
    }
}

fn input_report<const N: usize>(
    sb: &mut ServiceBuilder<'_>,
    id: u8,
    initial: [u8; N],
) -> Result<CharacteristicHandles, RegisterError> {
    let mut cb = sb.add_characteristic(
        REPORT,
        Attribute::new(initial).security(SECURITY),
        Metadata::with_security(Properties::new().read().notify(), SECURITY),
    )?;
    cb.add_descriptor(
        REPORT_REFERENCE,
        Attribute::new([id, ReportType::Input as u8]).security(SECURITY),
    )?;
    Ok(cb.build())
}

fn output_report(
    sb: &mut ServiceBuilder<'_>,
    id: u8,
) -> Result<CharacteristicHandles, RegisterError> {
    let mut cb = sb.add_characteristic(
        REPORT,
        Attribute::new([0u8]).security(SECURITY),
        Metadata::new(Properties::new().read().write().write_without_response()),
    )?;
    cb.add_descriptor(
        REPORT_REFERENCE,
        Attribute::new([id, ReportType::Output as u8]).security(SECURITY),
    )?;
    Ok(cb.build())
}

impl Service for HidService {
    type Event = HidServiceEvent;

    fn on_write(&self, handle: u16, data: &[u8]) -> Option<Self::Event> {
        let &first = data.first()?;

        if handle == self.protocol_mode {
            return Some(HidServiceEvent::ProtocolMode(ProtocolMode::from_byte(first)));
        }
        if handle == self.control_point {
            return Some(HidServiceEvent::ControlPoint(first));
        }
        if handle == self.handles.leds_out || handle == self.handles.boot_keyboard_out {
            return Some(HidServiceEvent::Leds(first));
        }
        if self.is_cccd(handle) {
            return Some(HidServiceEvent::CccdWrite {
                handle,
                notifications: first & 0x01 != 0,
            });
        }

        debug!("unhandled write to handle {}", handle);
        None
    }
}

/// Read-only device identification. Nothing on it is writable.
pub struct DeviceInformationService;

pub enum DeviceInformationServiceEvent {}

impl DeviceInformationService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, DEVICE_INFORMATION_SERVICE)?;

        let _manufacturer = sb
            .add_characteristic(
                MANUFACTURER_NAME_CHAR,
                Attribute::new(MANUFACTURER_NAME.as_bytes()).read_security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();
        let _pnp_id = sb
            .add_characteristic(
                PNP_ID_CHAR,
                Attribute::new(PNP_ID).read_security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();

        sb.build();
        Ok(Self)
    }
}

impl Service for DeviceInformationService {
    type Event = DeviceInformationServiceEvent;

    fn on_write(&self, _handle: u16, _data: &[u8]) -> Option<Self::Event> {
        None
    }
}

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify, security = "justworks")]
    battery_level: u8,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
    pub dis: DeviceInformationService,
    pub hid: HidService,
}
