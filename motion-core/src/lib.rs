//! Platform-agnostic motion control core.
//!
//! This crate turns parsed G-code lines into queued moves without touching
//! hardware:
//!
//! - **Interpreter**: [`CommandInterpreter`] executes G1/G28/G90/G91 and
//!   M0/M112/M114/M119/M202/M222 as a [`LineHandler`](gcode_proto::LineHandler)
//! - **Kinematics**: [`Cartesian`] and [`CoreXy`] geometries, one chosen at
//!   build time as [`ActiveKinematics`]
//! - **Collaborators**: [`MotionQueue`], [`Endstops`] and [`StatusSink`]
//!   traits implemented by the board crate
//! - **Executor**: [`StepExecutor`] steps queued moves with Bresenham's line
//!   algorithm; boards wrap it in a critical-section mutex
//! - **Channel**: [`CommandChannel`] drives a [`SerialLink`] through the
//!   parser and acknowledges each line
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded targets)
//! - **`log`**: Route internal logging through the `log` facade
//! - **`corexy`**: Build with the coupled-axis geometry
//! - **`z-axis`**: Carry a third, directly driven axis
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod channel;
pub mod config;
pub mod executor;
pub mod interpreter;
pub mod kinematics;
pub mod motion;

pub use channel::{ChannelError, CommandChannel, LinkError, SerialLink, ACK_OK, ACK_RESEND};
pub use config::{HomingConfig, MachineConfig, DEFAULT_HOMING, DEFAULT_MACHINE_CONFIG};
pub use executor::{StepExecutor, StepPulse, MIN_STEP_INTERVAL_US, QUEUE_DEPTH};
pub use interpreter::{Command, CommandError, CommandInterpreter, MachineMode};
pub use kinematics::{ActiveKinematics, AxesDelta, AxesSteps, Cartesian, CoreXy, Kinematics, MovePlan};
pub use motion::{
    EndstopCheck, EndstopMask, Endstops, ExecutionControl, HomingTrigger, MotionQueue, Move,
    QueueError, StatusError, StatusLine, StatusSink, STATUS_LINE_CAPACITY,
};

// Re-export protocol types used in the public API
pub use gcode_proto::{Axis, LineParser, LineStatus, Target, AXIS_COUNT};
