//! Serial console on UARTE0.
//!
//! Reads newline-terminated lines, runs them through [`crate::console`]
//! and writes a one-line reply (or the help text) back.

use core::fmt::Write as _;

use embassy_nrf::uarte::{self, Baudrate, Instance, Uarte, UarteRx, UarteTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use heapless::{String, Vec};

use crate::config::{CONSOLE_BAUD, CONSOLE_MAX_LINE, QUEUE_SEND_TIMEOUT_MS};
use crate::console::{self, Reply, HELP};
use crate::error::{Error, ParseError};
use crate::queues::CommandQueues;

const PROMPT: &str = "> ";

pub struct UartConsole<'d, T: Instance> {
    tx: UarteTx<'d, T>,
    rx: UarteRx<'d, T>,
    line: Vec<u8, CONSOLE_MAX_LINE>,
}

impl<'d, T: Instance> UartConsole<'d, T> {
    pub fn new(uart: Uarte<'d, T>) -> Self {
        let (tx, rx) = uart.split();
        Self {
            tx,
            rx,
            line: Vec::new(),
        }
    }

    /// Read bytes until a newline is found or the buffer is full.
    ///
    /// If a line exceeds the buffer capacity, the rest of the line is
    /// discarded so the next read starts at a line boundary.
    async fn read_line(&mut self) -> Result<(), Error> {
        self.line.clear();

        loop {
            let mut byte = [0u8; 1];
            self.rx.read(&mut byte).await?;

            match byte[0] {
                b'\n' => return Ok(()),
                b'\r' => continue,
                b => {
                    if self.line.push(b).is_err() {
                        loop {
                            self.rx.read(&mut byte).await?;
                            if byte[0] == b'\n' {
                                break;
                            }
                        }
                        return Err(Error::BufferOverflow);
                    }
                }
            }
        }
    }

    async fn write(&mut self, s: &str) -> Result<(), Error> {
        self.tx.write(s.as_bytes()).await?;
        Ok(())
    }

    /// Handle one console line, returning the reply to print.
    async fn process_line(
        &mut self,
        queues: &CommandQueues<CriticalSectionRawMutex>,
    ) -> Result<Reply, Error> {
        self.read_line().await?;
        let line = core::str::from_utf8(&self.line).map_err(|_| ParseError::UnknownCommand)?;
        debug!("console: {=str}", line);
        console::run_line(queues, line, || Timer::after_millis(QUEUE_SEND_TIMEOUT_MS)).await
    }

    pub async fn run(mut self, queues: &CommandQueues<CriticalSectionRawMutex>) -> ! {
        let _ = self.write("ble-kbm console, type 'help'\r\n").await;

        loop {
            let _ = self.write(PROMPT).await;

            let mut reply: String<48> = String::new();
            match self.process_line(queues).await {
                Ok(Reply::Queued(_)) => {
                    let _ = reply.push_str("ok\r\n");
                }
                Ok(Reply::Help) => {
                    let _ = self.write(HELP).await;
                    continue;
                }
                Err(Error::Parse(ParseError::Empty)) => continue,
                Err(e) => {
                    warn!("console: {}", e);
                    let _ = write!(reply, "error: {:?}\r\n", e);
                }
            }
            let _ = self.write(&reply).await;
        }
    }
}

impl From<uarte::Error> for Error {
    fn from(_: uarte::Error) -> Self {
        Error::Uart
    }
}

/// UARTE baud rate for [`CONSOLE_BAUD`]. Unsupported rates fall back to
/// 115200.
pub fn baudrate() -> Baudrate {
    match CONSOLE_BAUD {
        9_600 => Baudrate::BAUD9600,
        19_200 => Baudrate::BAUD19200,
        38_400 => Baudrate::BAUD38400,
        57_600 => Baudrate::BAUD57600,
        230_400 => Baudrate::BAUD230400,
        460_800 => Baudrate::BAUD460800,
        921_600 => Baudrate::BAUD921600,
        1_000_000 => Baudrate::BAUD1M,
        _ => Baudrate::BAUD115200,
    }
}
