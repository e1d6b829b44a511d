//! ble-kbm firmware entry point.
//!
//! Wires the shared state into statics and spawns:
//! - the SoftDevice event loop
//! - advertising / GATT serving
//! - bond persistence
//! - the dispatch loop
//! - the UART console

#![no_std]
#![no_main]

use defmt::{error, info, unwrap, warn, Debug2Format};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::{bind_interrupts, uarte};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ble_kbm::ble::device_info;
use ble_kbm::ble::directory::ReportDirectory;
use ble_kbm::ble::pairing::PairingStateMachine;
use ble_kbm::ble::TransportEvent;
use ble_kbm::dispatch::Dispatcher;
use ble_kbm::nrf::console_uart::{self, UartConsole};
use ble_kbm::nrf::server::Server;
use ble_kbm::nrf::transport::{Bonder, SoftdeviceTransport};
use ble_kbm::nrf as shell;
use ble_kbm::queues::CommandQueues;

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<UARTE0>;
});

static QUEUES: CommandQueues<CriticalSectionRawMutex> = CommandQueues::new();
static DIRECTORY: ReportDirectory<CriticalSectionRawMutex> = ReportDirectory::new();
static PAIRING: PairingStateMachine<CriticalSectionRawMutex> = PairingStateMachine::new();

static SERVER: StaticCell<Server> = StaticCell::new();
static TRANSPORT: StaticCell<SoftdeviceTransport> = StaticCell::new();
static BONDER: StaticCell<Bonder> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(
    sd: &'static Softdevice,
    server: &'static Server,
    transport: &'static SoftdeviceTransport,
    bonder: &'static Bonder,
) -> ! {
    shell::ble_task(sd, server, transport, bonder, &PAIRING, &DIRECTORY).await
}

#[embassy_executor::task]
async fn bond_store_task(sd: &'static Softdevice, transport: &'static SoftdeviceTransport) -> ! {
    shell::bond_store_task(sd, transport).await
}

#[embassy_executor::task]
async fn dispatch_task(transport: &'static SoftdeviceTransport) -> ! {
    Dispatcher::new(&QUEUES, &DIRECTORY, &PAIRING, transport)
        .run()
        .await
}

#[embassy_executor::task]
async fn console_task(console: UartConsole<'static, UARTE0>) -> ! {
    console.run(&QUEUES).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-kbm starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = console_uart::baudrate();
    interrupt::UARTE0_UART0.set_priority(Priority::P3);
    let uart = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);

    let sd = Softdevice::enable(&shell::softdevice_config());
    let server = Server::new(sd);
    let sd: &'static Softdevice = sd;

    let transport: &'static SoftdeviceTransport = TRANSPORT.init(SoftdeviceTransport::new(sd));
    let bonder: &'static Bonder = BONDER.init(Bonder::new(transport, &PAIRING));

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(bond_store_task(sd, transport)));

    let server: &'static Server = match server {
        Ok(server) => SERVER.init(server),
        Err(e) => {
            error!("HID service registration failed: {:?}", Debug2Format(&e));
            PAIRING.apply_transport_event(
                transport,
                TransportEvent::RegistrationFinished { ok: false },
            );
            return;
        }
    };

    if let Err(e) = server.bas.battery_level_set(&device_info::battery_level()) {
        warn!("battery level not set: {:?}", Debug2Format(&e));
    }

    if DIRECTORY
        .register(&server.hid.handles().report_table())
        .is_err()
    {
        error!("report table does not fit the directory");
    }

    unwrap!(spawner.spawn(ble_task(sd, server, transport, bonder)));
    unwrap!(spawner.spawn(dispatch_task(transport)));
    unwrap!(spawner.spawn(console_task(UartConsole::new(uart))));

    PAIRING.apply_transport_event(transport, TransportEvent::RegistrationFinished { ok: true });
}
