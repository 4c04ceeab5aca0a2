//! Minimum endstop switches.
//!
//! Normally-open switches to ground with the internal pull-ups enabled, so a
//! closed switch reads low. Both the stepper task (during homing) and the
//! interpreter (M119) read them, so the pins live behind a critical-section
//! mutex.
//!
//! # Pins
//!
//! - GPIO 14: X minimum
//! - GPIO 15: Y minimum

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::digital::InputPin;
use motion_core::{Axis, EndstopMask, Endstops};

/// The endstop inputs of the machine.
pub struct EndstopPins<I> {
    x_min: I,
    y_min: I,
}

/// Endstop pins shared between the stepper task and the interpreter.
pub type SharedEndstops<I> = Mutex<CriticalSectionRawMutex, RefCell<EndstopPins<I>>>;

impl<I: InputPin> EndstopPins<I> {
    pub fn new(x_min: I, y_min: I) -> Self {
        Self { x_min, y_min }
    }

    /// Every switch currently closed.
    pub fn triggered(&mut self) -> EndstopMask {
        let mut mask = 0;
        if is_closed(&mut self.x_min) {
            mask |= EndstopMask::X_MIN.0;
        }
        if is_closed(&mut self.y_min) {
            mask |= EndstopMask::Y_MIN.0;
        }
        EndstopMask(mask)
    }

    fn min_triggered(&mut self, axis: Axis) -> Option<bool> {
        match axis {
            Axis::X => Some(is_closed(&mut self.x_min)),
            Axis::Y => Some(is_closed(&mut self.y_min)),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Read errors count as open: a failed pin never stops a move.
#[inline]
fn is_closed<I: InputPin>(pin: &mut I) -> bool {
    pin.is_low().unwrap_or(false)
}

/// [`Endstops`] view of the shared pins for the interpreter.
///
/// The switches are wired permanently, so enabling only gates reporting.
pub struct GpioEndstops<I> {
    pins: &'static SharedEndstops<I>,
    enabled: bool,
}

impl<I: InputPin> GpioEndstops<I> {
    #[must_use]
    pub fn new(pins: &'static SharedEndstops<I>) -> Self {
        Self {
            pins,
            enabled: false,
        }
    }
}

impl<I: InputPin> Endstops for GpioEndstops<I> {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn min_triggered(&mut self, axis: Axis) -> Option<bool> {
        if !self.enabled {
            defmt::warn!("endstops read while disabled");
            return None;
        }
        self.pins.lock(|pins| pins.borrow_mut().min_triggered(axis))
    }
}
