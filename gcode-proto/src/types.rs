//! Core G-code types: Parameter, Axis, Target.

use core::ops::{Index, IndexMut};

use crate::decimal::decode_fixed;

/// Number of machine axes carried in a [`Target`].
#[cfg(not(feature = "z-axis"))]
pub const AXIS_COUNT: usize = 2;

/// Number of machine axes carried in a [`Target`].
#[cfg(feature = "z-axis")]
pub const AXIS_COUNT: usize = 3;

/// A machine axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X = 0,
    Y = 1,
    #[cfg(feature = "z-axis")]
    Z = 2,
}

impl Axis {
    /// All axes in index order.
    #[cfg(not(feature = "z-axis"))]
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y];

    /// All axes in index order.
    #[cfg(feature = "z-axis")]
    pub const ALL: [Axis; AXIS_COUNT] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in per-axis arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Uppercase ASCII letter naming this axis in G-code.
    #[inline]
    #[must_use]
    pub const fn letter(self) -> u8 {
        match self {
            Axis::X => b'X',
            Axis::Y => b'Y',
            #[cfg(feature = "z-axis")]
            Axis::Z => b'Z',
        }
    }
}

/// A machine position: per-axis coordinates in micrometres plus a feed rate.
///
/// Used for the pending target of the next move, the last achieved position
/// and the start point of the move currently executing.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Target {
    /// Coordinates in micrometres, indexed by [`Axis::index`].
    pub axis: [i32; AXIS_COUNT],
    /// Feed rate in mm/min.
    pub feed: u32,
}

impl Target {
    /// All axes at zero, feed zero.
    pub const ORIGIN: Self = Self {
        axis: [0; AXIS_COUNT],
        feed: 0,
    };

    #[must_use]
    pub const fn new(axis: [i32; AXIS_COUNT], feed: u32) -> Self {
        Self { axis, feed }
    }
}

impl Index<Axis> for Target {
    type Output = i32;

    #[inline]
    fn index(&self, axis: Axis) -> &i32 {
        &self.axis[axis.index()]
    }
}

impl IndexMut<Axis> for Target {
    #[inline]
    fn index_mut(&mut self, axis: Axis) -> &mut i32 {
        &mut self.axis[axis.index()]
    }
}

/// One `letter + number` token of a command line.
///
/// The number is kept undecoded: `mantissa` holds every digit seen and
/// `fraction_digits` records the decimal point with a bias of one
/// (0 = no point, 1 = point with no digits after it, n = n - 1 digits after
/// it). [`Parameter::decode`] turns it into a scaled integer.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Parameter {
    /// Uppercase ASCII letter, 0 while unset.
    pub name: u8,
    pub mantissa: u32,
    pub fraction_digits: u8,
    pub negative: bool,
}

impl Parameter {
    /// A slot with nothing recorded.
    pub const EMPTY: Self = Self {
        name: 0,
        mantissa: 0,
        fraction_digits: 0,
        negative: false,
    };

    /// Decode the number, scaled by `multiplier`.
    #[inline]
    #[must_use]
    pub fn decode(&self, multiplier: u16) -> i32 {
        decode_fixed(self.mantissa, self.fraction_digits, self.negative, multiplier)
    }

    /// The number as a command code (`G1`, `M114`).
    ///
    /// Returns `None` if it carries a sign or a decimal point.
    #[inline]
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        if self.negative || self.fraction_digits != 0 {
            None
        } else {
            Some(self.mantissa)
        }
    }
}
