//! G-code motion controller for RP2040.
//!
//! This crate provides the embedded implementation of a two-axis motion
//! controller that receives G-code over UART and drives step/direction
//! stepper drivers.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) and:
//! 1. Receives G-code lines over UART (115200 baud, 8N1)
//! 2. Parses and executes each line, answering `ok` or `rs` (resend)
//! 3. Steps queued moves from a dedicated task, stopping on endstops while
//!    homing
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | UART1 TX | 8    | Acknowledgements and status lines |
//! | UART1 RX | 9    | G-code input |
//! | Steppers | 2-6  | See [`stepper`] |
//! | Endstops | 14, 15 | See [`endstops`] |
//! | LED      | 25   | On-board LED (error indicator) |
//!
//! # Architecture
//!
//! The firmware uses the Embassy async runtime with two concurrent tasks:
//!
//! - **Command Task**: Reads UART bytes through a
//!   [`CommandChannel`](motion_core::CommandChannel) into the
//!   [`CommandInterpreter`](motion_core::CommandInterpreter)
//! - **Stepper Task**: Ticks the shared [`StepExecutor`](motion_core::StepExecutor)
//!   and pulses the driver pins
//!
//! The executor sits in a critical-section mutex, so M0 can stop a move and
//! read back its position without racing the stepper task.
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`corexy`**: Coupled-axis (CoreXY) mechanics instead of Cartesian
//!
//! # Re-exports
//!
//! This crate re-exports the [`motion_core`] types a board binary needs, so
//! consumers only need to depend on this crate.

#![no_std]

pub use motion_core::{
    CommandChannel, CommandInterpreter, LinkError, MachineConfig, StatusLine, StepExecutor,
    DEFAULT_MACHINE_CONFIG,
};

pub mod endstops;
pub mod stepper;
pub mod uart_link;

pub use endstops::{EndstopPins, GpioEndstops, SharedEndstops};
pub use stepper::{run_stepper, SharedExecutor, StepperPins, StepperQueue, StepperWake};
pub use uart_link::{QueuedStatus, StatusQueue, UartLink, STATUS_QUEUE_DEPTH};
