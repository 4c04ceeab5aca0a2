//! Traits for the interpreter's collaborators and the types passed to them.
//!
//! The interpreter never touches hardware. It talks to:
//!
//! - a [`MotionQueue`] that executes moves (usually from a timer interrupt),
//! - [`Endstops`] for limit switch state,
//! - a [`StatusSink`] that carries report lines back to the host.
//!
//! # `no_std` Compatibility
//!
//! All implementations must be `#![no_std]` compatible with no heap allocation.

use gcode_proto::{Axis, Target, MAX_POSITION_REPORT_SIZE};

use crate::kinematics::MovePlan;

/// Capacity of one status line.
pub const STATUS_LINE_CAPACITY: usize = MAX_POSITION_REPORT_SIZE;

/// One serialized status line.
pub type StatusLine = heapless::Vec<u8, STATUS_LINE_CAPACITY>;

/// Set of endstop inputs, one bit per switch.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndstopMask(pub u8);

impl EndstopMask {
    pub const X_MIN: Self = Self(1 << 0);
    pub const X_MAX: Self = Self(1 << 1);
    pub const Y_MIN: Self = Self(1 << 2);
    pub const Y_MAX: Self = Self(1 << 3);
    pub const Z_MIN: Self = Self(1 << 4);
    pub const Z_MAX: Self = Self(1 << 5);

    /// Check if every switch in `other` is part of this set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: EndstopMask) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// When a homing move ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingTrigger {
    /// Stop as soon as a watched endstop reads triggered.
    UntilTriggered,
    /// Stop as soon as every watched endstop reads released.
    UntilReleased,
}

/// Endstop supervision attached to a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndstopCheck {
    pub endstops: EndstopMask,
    pub trigger: HomingTrigger,
}

/// A move handed to the motion queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Move {
    /// Axis-space end point, including the feed rate.
    pub target: Target,
    /// Motor-space travel computed by the active kinematics.
    pub plan: MovePlan,
    /// Endstops that may cut the move short (homing only).
    pub endstop_check: Option<EndstopCheck>,
}

/// Error type for motion queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// No free slot for another move.
    Full,
    /// Motion was disabled by an emergency stop.
    Halted,
}

/// Error type for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusError {
    /// Transmit buffer is full; the line was dropped.
    BufferFull,
    /// I/O error during transmission.
    Io,
}

/// Execution state shared with the stepper interrupt.
///
/// Only reachable inside [`MotionQueue::critical_section`], so every method
/// sees a consistent snapshot of the move in progress.
pub trait ExecutionControl {
    /// True while a move is being stepped.
    fn in_flight(&self) -> bool;

    /// Position reached so far, from the step counters of the move in
    /// progress.
    fn achieved_position(&self) -> Target;

    /// Stop stepping the move in progress and mark it done.
    fn abort_current(&mut self);

    /// Drop every queued move that has not started.
    fn flush(&mut self);

    /// Let the executor pick up its next state once.
    fn advance(&mut self);

    /// Re-derive the step-space start point for the next move.
    fn set_start_point(&mut self, start: &Target);
}

/// Queue of moves executed asynchronously to the interpreter.
pub trait MotionQueue {
    /// The interrupt-shared execution state.
    type Execution: ExecutionControl;

    /// Append a move. Returns immediately; the move runs later.
    fn enqueue(&mut self, mv: &Move) -> Result<(), QueueError>;

    /// Last achieved position, recomputed from step counters.
    fn current_position(&mut self) -> Target;

    /// Queue entries still available. Origin changes take a slot too.
    fn free_slots(&mut self) -> usize;

    /// Re-derive the step-space start point once the queued moves have run.
    ///
    /// # Errors
    ///
    /// Refused like [`enqueue`](Self::enqueue) when there is no room.
    fn set_start_point(&mut self, start: &Target) -> Result<(), QueueError>;

    /// Run `f` with the stepper interrupt excluded.
    fn critical_section<R>(&mut self, f: impl FnOnce(&mut Self::Execution) -> R) -> R;

    /// Stop the step timer, drop every move and disable motion for good.
    fn halt(&mut self);
}

/// Limit switch inputs.
pub trait Endstops {
    /// Power up the endstop inputs.
    fn enable(&mut self);

    /// Power down the endstop inputs.
    fn disable(&mut self);

    /// State of the minimum endstop of `axis`, or `None` if there is none.
    fn min_triggered(&mut self, axis: Axis) -> Option<bool>;
}

/// Destination for status report lines.
pub trait StatusSink {
    /// Send one complete line, terminator included.
    fn send_status(&mut self, line: &[u8]) -> Result<(), StatusError>;
}
