//! Stepper drivers and the motion queue built on them.
//!
//! The [`StepExecutor`] lives in a critical-section mutex shared by two
//! contexts:
//!
//! - the interpreter, through [`StepperQueue`] ([`MotionQueue`]),
//! - the stepper task, through [`run_stepper`], which ticks the executor
//!   and pulses the driver pins.
//!
//! # Pins
//!
//! | Function | GPIO |
//! |----------|------|
//! | X / A step | 2 |
//! | X / A dir  | 3 |
//! | Y / B step | 4 |
//! | Y / B dir  | 5 |
//! | Enable (active low) | 6 |

use core::cell::RefCell;

use defmt::info;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use motion_core::{MotionQueue, Move, QueueError, StepExecutor, StepPulse, Target, AXIS_COUNT};

use crate::endstops::SharedEndstops;

/// Step pulse width in core clock cycles (~2 us at 125 MHz).
const STEP_PULSE_CYCLES: u32 = 250;

/// Executor shared between the interpreter and the stepper task.
pub type SharedExecutor = Mutex<CriticalSectionRawMutex, RefCell<StepExecutor>>;

/// Wakes an idle stepper task when work arrives.
pub type StepperWake = Signal<CriticalSectionRawMutex, ()>;

/// Step/direction driver outputs, one pair per motor.
pub struct StepperPins<P> {
    step: [P; AXIS_COUNT],
    dir: [P; AXIS_COUNT],
    enable: P,
}

impl<P: OutputPin> StepperPins<P> {
    pub fn new(step: [P; AXIS_COUNT], dir: [P; AXIS_COUNT], enable: P) -> Self {
        Self { step, dir, enable }
    }

    /// Energize the drivers.
    pub fn enable(&mut self) {
        let _ = self.enable.set_low();
    }

    /// Release the drivers; the motors no longer hold position.
    pub fn disable(&mut self) {
        let _ = self.enable.set_high();
    }

    /// Set directions, then raise and drop the step line of every motor
    /// stepping this tick.
    pub fn pulse(&mut self, pulse: &StepPulse) {
        for (i, dir) in self.dir.iter_mut().enumerate() {
            let _ = dir.set_state(PinState::from(pulse.is_reverse(i)));
        }
        for (i, step) in self.step.iter_mut().enumerate() {
            if pulse.steps(i) {
                let _ = step.set_high();
            }
        }
        cortex_m::asm::delay(STEP_PULSE_CYCLES);
        for step in &mut self.step {
            let _ = step.set_low();
        }
    }
}

/// [`MotionQueue`] over the shared executor.
pub struct StepperQueue {
    executor: &'static SharedExecutor,
    wake: &'static StepperWake,
}

impl StepperQueue {
    #[must_use]
    pub fn new(executor: &'static SharedExecutor, wake: &'static StepperWake) -> Self {
        Self { executor, wake }
    }
}

impl MotionQueue for StepperQueue {
    type Execution = StepExecutor;

    fn enqueue(&mut self, mv: &Move) -> Result<(), QueueError> {
        self.executor.lock(|e| e.borrow_mut().push(mv))?;
        self.wake.signal(());
        Ok(())
    }

    fn current_position(&mut self) -> Target {
        self.executor.lock(|e| e.borrow().position())
    }

    fn free_slots(&mut self) -> usize {
        self.executor.lock(|e| e.borrow().free_slots())
    }

    fn set_start_point(&mut self, start: &Target) -> Result<(), QueueError> {
        self.executor.lock(|e| e.borrow_mut().push_origin(start))?;
        self.wake.signal(());
        Ok(())
    }

    fn critical_section<R>(&mut self, f: impl FnOnce(&mut StepExecutor) -> R) -> R {
        let result = self.executor.lock(|e| f(&mut e.borrow_mut()));
        self.wake.signal(());
        result
    }

    fn halt(&mut self) {
        self.executor.lock(|e| e.borrow_mut().halt());
        self.wake.signal(());
    }
}

/// Step queued moves forever.
///
/// Sleeps on `wake` whenever the executor runs dry, and releases the
/// drivers once the executor is halted.
pub async fn run_stepper<P: OutputPin, I: InputPin>(
    executor: &'static SharedExecutor,
    wake: &'static StepperWake,
    endstops: &'static SharedEndstops<I>,
    pins: &mut StepperPins<P>,
) -> ! {
    pins.enable();
    loop {
        let triggered = endstops.lock(|e| e.borrow_mut().triggered());
        let (pulse, halted) = executor.lock(|e| {
            let mut e = e.borrow_mut();
            (e.tick(triggered), e.is_halted())
        });

        match pulse {
            Some(pulse) => {
                pins.pulse(&pulse);
                Timer::after_micros(u64::from(pulse.interval_us)).await;
            }
            None => {
                if halted {
                    pins.disable();
                    info!("motion halted, drivers released");
                }
                wake.wait().await;
            }
        }
    }
}
