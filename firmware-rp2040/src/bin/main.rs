#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{error, info};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART1;
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use gcode_motion_rp2040::{
    run_stepper, CommandChannel, CommandInterpreter, EndstopPins, GpioEndstops, MachineConfig,
    QueuedStatus, SharedEndstops, SharedExecutor, StatusQueue, StepExecutor, StepperPins,
    StepperQueue, StepperWake, UartLink, DEFAULT_MACHINE_CONFIG,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
});

/// Machine calibration for this board.
const MACHINE: MachineConfig = DEFAULT_MACHINE_CONFIG;

/// Move queue and step state, shared with the stepper task.
static EXECUTOR: SharedExecutor = Mutex::new(RefCell::new(StepExecutor::new(MACHINE.steps_per_m)));

/// Wakes the stepper task when moves arrive.
static STEPPER_WAKE: StepperWake = Signal::new();

/// Status lines waiting to be written ahead of the next acknowledgement.
static STATUS_QUEUE: StatusQueue = Channel::new();

/// Endstop pins, read by both tasks.
static ENDSTOPS: StaticCell<SharedEndstops<Input<'static>>> = StaticCell::new();

type Interpreter = CommandInterpreter<StepperQueue, GpioEndstops<Input<'static>>, QueuedStatus>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("G-code motion controller starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (tx, rx) = uart.split();
    let link = UartLink::new(tx, rx, &STATUS_QUEUE);

    // --- Endstops ---
    let endstops: &'static SharedEndstops<Input<'static>> = ENDSTOPS.init(Mutex::new(RefCell::new(
        EndstopPins::new(Input::new(p.PIN_14, Pull::Up), Input::new(p.PIN_15, Pull::Up)),
    )));

    // --- Stepper drivers ---
    let pins = StepperPins::new(
        [
            Output::new(p.PIN_2, Level::Low), // X / A step
            Output::new(p.PIN_4, Level::Low), // Y / B step
        ],
        [
            Output::new(p.PIN_3, Level::Low), // X / A dir
            Output::new(p.PIN_5, Level::Low), // Y / B dir
        ],
        Output::new(p.PIN_6, Level::High), // enable, active low
    );

    // --- Interpreter ---
    let interpreter = CommandInterpreter::with_config(
        StepperQueue::new(&EXECUTOR, &STEPPER_WAKE),
        GpioEndstops::new(endstops),
        QueuedStatus::new(&STATUS_QUEUE),
        MACHINE,
    );
    let channel = CommandChannel::new(link, interpreter);

    // On-board LED for error indication
    let led = Output::new(p.PIN_25, Level::Low);

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(stepper_task(endstops, pins).unwrap());
    spawner.spawn(command_task(channel, led).unwrap());

    info!("G-code motion controller initialized, waiting for commands...");
}

/// Stepper task - steps queued moves.
#[embassy_executor::task]
async fn stepper_task(
    endstops: &'static SharedEndstops<Input<'static>>,
    mut pins: StepperPins<Output<'static>>,
) {
    run_stepper(&EXECUTOR, &STEPPER_WAKE, endstops, &mut pins).await
}

/// Command task - reads G-code from UART and executes it line by line.
#[embassy_executor::task]
async fn command_task(
    mut channel: CommandChannel<UartLink<'static>, Interpreter>,
    mut led: Output<'static>,
) {
    loop {
        if let Err(e) = channel.process_line().await {
            error!("Link error: {:?}", e);
            // Toggle LED to indicate error
            led.toggle();
        }
    }
}
