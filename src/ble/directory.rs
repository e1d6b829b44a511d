//! Report directory: which GATT attribute carries which HID report.
//!
//! The HID service exposes one characteristic per (report ID, report type)
//! in report protocol mode, plus the fixed boot keyboard / boot mouse
//! characteristics used in boot protocol mode. The table is registered
//! once after the GATT service is built; every send then resolves its
//! attribute handle here using the protocol mode the host selected.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use super::{AttributeHandle, ConnectionId, Transport};
use crate::config::MAX_REPORTS;
use crate::error::Error;
use crate::hid::{
    ProtocolMode, ReportType, REPORT_ID_CONSUMER_IN, REPORT_ID_KEYBOARD_IN, REPORT_ID_LEDS_OUT,
    REPORT_ID_MOUSE_IN,
};

/// One registered report characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportDescriptor {
    pub id: u8,
    pub report_type: ReportType,
    pub mode: ProtocolMode,
    /// Value handle of the characteristic.
    pub handle: AttributeHandle,
    /// Client configuration (CCCD) handle, if the characteristic notifies.
    pub config_handle: Option<AttributeHandle>,
}

impl ReportDescriptor {
    pub const fn new(
        id: u8,
        report_type: ReportType,
        mode: ProtocolMode,
        handle: AttributeHandle,
        config_handle: Option<AttributeHandle>,
    ) -> Self {
        Self {
            id,
            report_type,
            mode,
            handle,
            config_handle,
        }
    }

    fn matches(&self, id: u8, report_type: ReportType, mode: ProtocolMode) -> bool {
        self.id == id && self.report_type == report_type && self.mode == mode
    }
}

/// Attribute handles of the HID service characteristics, as returned by
/// the GATT server when the service is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HidHandles {
    pub mouse_in: AttributeHandle,
    pub mouse_in_cccd: AttributeHandle,
    pub keyboard_in: AttributeHandle,
    pub keyboard_in_cccd: AttributeHandle,
    pub leds_out: AttributeHandle,
    pub consumer_in: AttributeHandle,
    pub consumer_in_cccd: AttributeHandle,
    pub boot_keyboard_in: AttributeHandle,
    pub boot_keyboard_in_cccd: AttributeHandle,
    pub boot_keyboard_out: AttributeHandle,
    pub boot_mouse_in: AttributeHandle,
    pub boot_mouse_in_cccd: AttributeHandle,
}

impl HidHandles {
    /// The report table for these handles, report-mode entries first.
    pub fn report_table(&self) -> Vec<ReportDescriptor, MAX_REPORTS> {
        use ProtocolMode::{Boot, Report};
        use ReportType::{Input, Output};

        #[rustfmt::skip]
        let entries = [
            ReportDescriptor::new(REPORT_ID_MOUSE_IN, Input, Report, self.mouse_in, Some(self.mouse_in_cccd)),
            ReportDescriptor::new(REPORT_ID_KEYBOARD_IN, Input, Report, self.keyboard_in, Some(self.keyboard_in_cccd)),
            ReportDescriptor::new(REPORT_ID_LEDS_OUT, Output, Report, self.leds_out, None),
            ReportDescriptor::new(REPORT_ID_CONSUMER_IN, Input, Report, self.consumer_in, Some(self.consumer_in_cccd)),
            ReportDescriptor::new(REPORT_ID_KEYBOARD_IN, Input, Boot, self.boot_keyboard_in, Some(self.boot_keyboard_in_cccd)),
            ReportDescriptor::new(REPORT_ID_LEDS_OUT, Output, Boot, self.boot_keyboard_out, None),
            ReportDescriptor::new(REPORT_ID_MOUSE_IN, Input, Boot, self.boot_mouse_in, Some(self.boot_mouse_in_cccd)),
        ];

        entries.into_iter().collect()
    }
}

/// Registered report table plus the host-selected protocol mode.
pub struct ReportDirectory<M: RawMutex> {
    table: Mutex<M, RefCell<Vec<ReportDescriptor, MAX_REPORTS>>>,
    mode: Mutex<M, Cell<ProtocolMode>>,
}

impl<M: RawMutex> ReportDirectory<M> {
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(RefCell::new(Vec::new())),
            mode: Mutex::new(Cell::new(ProtocolMode::Report)),
        }
    }

    /// Replace the active table.
    ///
    /// A table larger than [`MAX_REPORTS`] is rejected and the previous
    /// table stays in place.
    pub fn register(&self, reports: &[ReportDescriptor]) -> Result<(), Error> {
        let table = Vec::from_slice(reports).map_err(|_| {
            warn!("report table too large: {}", reports.len());
            Error::BufferOverflow
        })?;
        self.table.lock(|t| *t.borrow_mut() = table);
        info!("registered {} reports", reports.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.lock(|t| t.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First registered report matching all three keys.
    pub fn find(
        &self,
        id: u8,
        report_type: ReportType,
        mode: ProtocolMode,
    ) -> Option<ReportDescriptor> {
        self.table.lock(|t| {
            t.borrow()
                .iter()
                .find(|r| r.matches(id, report_type, mode))
                .copied()
        })
    }

    /// [`find`](Self::find) in the active protocol mode.
    pub fn resolve(&self, id: u8, report_type: ReportType) -> Option<ReportDescriptor> {
        let mode = self.protocol_mode();
        let found = self.find(id, report_type, mode);
        if found.is_none() {
            warn!("no report for id {} type {} in mode {}", id, report_type as u8, mode as u8);
        }
        found
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.mode.lock(|m| m.get())
    }

    /// Host wrote the Protocol Mode characteristic.
    pub fn set_protocol_mode(&self, mode: ProtocolMode) {
        self.mode.lock(|m| m.set(mode));
        info!("protocol mode: {}", mode as u8);
    }

    /// Resolve the report and notify `payload` on `conn`.
    pub fn send_report<T: Transport>(
        &self,
        transport: &T,
        conn: ConnectionId,
        id: u8,
        report_type: ReportType,
        payload: &[u8],
    ) -> Result<(), Error> {
        let report = self.resolve(id, report_type).ok_or(Error::ReportNotFound)?;
        debug!("send report {} handle {} len {}", id, report.handle, payload.len());
        transport
            .notify(conn, report.handle, payload)
            .map_err(|e| {
                warn!("notify on handle {} failed: {}", report.handle, e);
                Error::from(e)
            })
    }

    /// Write the value of a (typically output) report attribute.
    pub fn set_output_attribute<T: Transport>(
        &self,
        transport: &T,
        id: u8,
        report_type: ReportType,
        value: &[u8],
    ) -> Result<(), Error> {
        let report = self.resolve(id, report_type).ok_or(Error::ReportNotFound)?;
        transport.set_attribute(report.handle, value).map_err(|e| {
            warn!("write of handle {} failed: {}", report.handle, e);
            Error::from(e)
        })
    }

    /// Read the value of a report attribute into `buf`.
    /// Returns 0 on a lookup miss or a failed read.
    pub fn get_output_attribute<T: Transport>(
        &self,
        transport: &T,
        id: u8,
        report_type: ReportType,
        buf: &mut [u8],
    ) -> usize {
        let Some(report) = self.resolve(id, report_type) else {
            return 0;
        };
        match transport.get_attribute(report.handle, buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("read of handle {} failed: {}", report.handle, e);
                0
            }
        }
    }

    /// Current keyboard LED state (bit 0 num lock, bit 1 caps lock, ...).
    pub fn leds<T: Transport>(&self, transport: &T) -> u8 {
        let mut buf = [0u8; 1];
        match self.get_output_attribute(transport, REPORT_ID_LEDS_OUT, ReportType::Output, &mut buf) {
            0 => 0,
            _ => buf[0],
        }
    }

    /// Enable or disable notifications of the LED output report by writing
    /// its configuration descriptor.
    pub fn set_led_notifications<T: Transport>(
        &self,
        transport: &T,
        enabled: bool,
    ) -> Result<(), Error> {
        let handle = self
            .resolve(REPORT_ID_LEDS_OUT, ReportType::Output)
            .and_then(|r| r.config_handle)
            .ok_or(Error::ReportNotFound)?;

        let value = [u8::from(enabled), 0];
        transport.set_attribute(handle, &value)?;
        info!("LED notifications enabled: {}", enabled);
        Ok(())
    }
}

impl<M: RawMutex> Default for ReportDirectory<M> {
    fn default() -> Self {
        Self::new()
    }
}
