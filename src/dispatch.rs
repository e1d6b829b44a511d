//! Dispatch loop: drains the command queues and turns each command into
//! transport calls.
//!
//! Reports are only sent while a central is connected; otherwise the
//! command is dropped with a diagnostic.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::ble::directory::ReportDirectory;
use crate::ble::pairing::PairingStateMachine;
use crate::ble::Transport;
use crate::error::{Error, TransportError};
use crate::hid::{
    ConsumerAction, ConsumerReport, HidReport, KeyboardReport, MouseReport, ReportType,
    MAX_REPORT_SIZE,
};
use crate::queues::{AdminCommand, Command, CommandQueues};

pub struct Dispatcher<'a, M: RawMutex, T: Transport> {
    queues: &'a CommandQueues<M>,
    directory: &'a ReportDirectory<M>,
    pairing: &'a PairingStateMachine<M>,
    transport: &'a T,
}

impl<'a, M: RawMutex, T: Transport> Dispatcher<'a, M, T> {
    pub fn new(
        queues: &'a CommandQueues<M>,
        directory: &'a ReportDirectory<M>,
        pairing: &'a PairingStateMachine<M>,
        transport: &'a T,
    ) -> Self {
        Self {
            queues,
            directory,
            pairing,
            transport,
        }
    }

    /// Run forever, handling commands as they arrive.
    pub async fn run(&self) -> ! {
        info!("dispatch loop started");
        loop {
            let cmd = self.queues.next().await;
            self.handle(cmd);
        }
    }

    /// One pass over the queues, at most one command from each.
    /// Returns how many commands were handled.
    pub fn poll_once(&self) -> usize {
        self.queues.drain_round(|cmd| self.handle(cmd))
    }

    pub fn handle(&self, cmd: Command) {
        debug!("dispatch {}", cmd);
        match cmd {
            Command::PasskeyReply(v) => self.pairing.reply_passkey(self.transport, v),
            Command::Keyboard(ev) => {
                let report = KeyboardReport::new(ev.modifier, ev.keycode);
                let _ = self.send(HidReport::Keyboard(report));
            }
            Command::Mouse(ev) => {
                let report = MouseReport::new(ev.buttons, ev.dx, ev.dy);
                let _ = self.send(HidReport::Mouse(report));
            }
            Command::Admin(AdminCommand::DeleteAllBondings) => {
                self.pairing.delete_all_bondings(self.transport);
            }
            Command::Admin(AdminCommand::ListBondings) => {
                self.pairing.list_bondings(self.transport);
            }
            Command::Consumer(action) => self.send_consumer(action),
            Command::TypeCharacter(c) => self.send_character(c),
        }
    }

    /// Press and release the key for `c`.
    fn send_character(&self, c: char) {
        let Some(press) = KeyboardReport::for_char(c) else {
            warn!("no key for character {=u32:#x}", c as u32);
            return;
        };
        if self.send(HidReport::Keyboard(press)).is_ok() {
            let _ = self.send(HidReport::Keyboard(KeyboardReport::released()));
        }
    }

    /// Send the action's report, then an all-clear report.
    fn send_consumer(&self, action: ConsumerAction) {
        if self.send(HidReport::Consumer(ConsumerReport::new(action))).is_ok() {
            let _ = self.send(HidReport::Consumer(ConsumerReport::empty()));
        }
    }

    fn send(&self, report: HidReport) -> Result<(), Error> {
        let Some(conn) = self.pairing.connection_id() else {
            warn!("not connected, dropping report {}", report.report_id());
            return Err(TransportError::NotConnected.into());
        };

        let mut buf = [0u8; MAX_REPORT_SIZE];
        let len = report.serialize(self.directory.protocol_mode(), &mut buf);
        self.directory.send_report(
            self.transport,
            conn,
            report.report_id(),
            ReportType::Input,
            &buf[..len],
        )
    }
}
