//! Axis-space to motor-space conversion.
//!
//! Two geometries are provided:
//!
//! - [`Cartesian`]: every motor drives exactly one axis.
//! - [`CoreXy`]: motors A and B jointly drive X and Y
//!   (`A = X + Y`, `B = X - Y`); any further axis is driven directly.
//!
//! The geometry is a build-time choice: [`ActiveKinematics`] is `Cartesian`
//! unless the `corexy` feature is enabled. Both produce the same
//! [`MovePlan`], so the motion queue never needs to know which one is in
//! use.

use gcode_proto::{Target, AXIS_COUNT};

/// Absolute travel per motor, in micrometres of motor-space.
pub type AxesDelta = [u32; AXIS_COUNT];

/// Signed step count per motor.
pub type AxesSteps = [i32; AXIS_COUNT];

const UM_PER_M: i64 = 1_000_000;

/// Per-motor travel and step counts for one move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MovePlan {
    /// Distance each motor travels, always non-negative.
    pub delta_um: AxesDelta,
    /// Steps each motor takes; the sign gives the direction.
    pub steps: AxesSteps,
}

/// A machine geometry.
///
/// Implementations are stateless; all methods are associated functions.
pub trait Kinematics {
    /// Motor-space coordinates of an axis-space position, in micrometres.
    fn motor_um(position: &Target) -> [i64; AXIS_COUNT];

    /// Axis-space position (micrometres) of motor-space coordinates.
    fn axis_um(motor_um: &[i64; AXIS_COUNT]) -> [i32; AXIS_COUNT];

    /// Absolute motor position in steps.
    fn motor_steps(position: &Target, steps_per_m: &[u32; AXIS_COUNT]) -> AxesSteps {
        let motor = Self::motor_um(position);
        let mut steps = [0; AXIS_COUNT];
        for (i, s) in steps.iter_mut().enumerate() {
            *s = um_to_steps(motor[i], steps_per_m[i]);
        }
        steps
    }

    /// Axis-space position (micrometres) of an absolute motor position.
    fn position_from_steps(steps: &AxesSteps, steps_per_m: &[u32; AXIS_COUNT]) -> [i32; AXIS_COUNT] {
        let mut motor = [0i64; AXIS_COUNT];
        for (i, m) in motor.iter_mut().enumerate() {
            *m = steps_to_um(steps[i], steps_per_m[i]);
        }
        Self::axis_um(&motor)
    }

    /// Plan the move from `start` to `target`.
    ///
    /// Step counts are the difference of the two absolute motor positions,
    /// so rounding never accumulates over a sequence of moves.
    fn plan(start: &Target, target: &Target, steps_per_m: &[u32; AXIS_COUNT]) -> MovePlan {
        let from = Self::motor_um(start);
        let to = Self::motor_um(target);
        let from_steps = Self::motor_steps(start, steps_per_m);
        let to_steps = Self::motor_steps(target, steps_per_m);

        let mut plan = MovePlan::default();
        for i in 0..AXIS_COUNT {
            plan.delta_um[i] = saturate_u32((to[i] - from[i]).unsigned_abs());
            plan.steps[i] = to_steps[i].saturating_sub(from_steps[i]);
        }
        plan
    }
}

/// Direct-axis geometry: one motor per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cartesian;

impl Kinematics for Cartesian {
    fn motor_um(position: &Target) -> [i64; AXIS_COUNT] {
        position.axis.map(i64::from)
    }

    fn axis_um(motor_um: &[i64; AXIS_COUNT]) -> [i32; AXIS_COUNT] {
        motor_um.map(saturate_i32)
    }
}

/// Coupled-axis geometry: motors A and B each move both X and Y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreXy;

impl Kinematics for CoreXy {
    fn motor_um(position: &Target) -> [i64; AXIS_COUNT] {
        let mut motor = position.axis.map(i64::from);
        let (x, y) = (motor[0], motor[1]);
        motor[0] = x + y;
        motor[1] = x - y;
        motor
    }

    fn axis_um(motor_um: &[i64; AXIS_COUNT]) -> [i32; AXIS_COUNT] {
        let mut axis = motor_um.map(saturate_i32);
        let (a, b) = (motor_um[0], motor_um[1]);
        axis[0] = saturate_i32(half_round(a + b));
        axis[1] = saturate_i32(half_round(a - b));
        axis
    }
}

/// The geometry compiled into this build.
#[cfg(not(feature = "corexy"))]
pub type ActiveKinematics = Cartesian;

/// The geometry compiled into this build.
#[cfg(feature = "corexy")]
pub type ActiveKinematics = CoreXy;

/// Convert micrometres to steps, rounding to nearest (ties away from zero).
#[must_use]
pub fn um_to_steps(um: i64, steps_per_m: u32) -> i32 {
    let scaled = um.saturating_mul(i64::from(steps_per_m));
    let half = UM_PER_M / 2;
    let rounded = if scaled >= 0 {
        scaled.saturating_add(half) / UM_PER_M
    } else {
        scaled.saturating_sub(half) / UM_PER_M
    };
    saturate_i32(rounded)
}

/// Convert steps back to micrometres, rounding to nearest.
///
/// Returns 0 for an uncalibrated motor (`steps_per_m == 0`).
#[must_use]
pub fn steps_to_um(steps: i32, steps_per_m: u32) -> i64 {
    if steps_per_m == 0 {
        return 0;
    }
    let spm = i64::from(steps_per_m);
    let scaled = i64::from(steps) * UM_PER_M;
    if scaled >= 0 {
        (scaled + spm / 2) / spm
    } else {
        (scaled - spm / 2) / spm
    }
}

/// Halve, rounding ties away from zero like [`um_to_steps`].
#[inline]
fn half_round(value: i64) -> i64 {
    if value >= 0 {
        (value + 1) / 2
    } else {
        (value - 1) / 2
    }
}

#[inline]
fn saturate_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[inline]
fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
