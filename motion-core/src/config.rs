//! Compile-time machine configuration.
//!
//! Calibration lives in `const` structs so a board crate can override any
//! field with struct-update syntax:
//!
//! ```
//! use motion_core::{MachineConfig, DEFAULT_MACHINE_CONFIG};
//!
//! const MY_MACHINE: MachineConfig = MachineConfig {
//!     steps_per_m: [100_000; motion_core::AXIS_COUNT],
//!     ..DEFAULT_MACHINE_CONFIG
//! };
//! assert_eq!(MY_MACHINE.homing, DEFAULT_MACHINE_CONFIG.homing);
//! ```

use gcode_proto::AXIS_COUNT;

/// Endstop search parameters used by G28.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingConfig {
    /// Fast approach feed rate (mm/min).
    ///
    /// When this exceeds `search_feed_y`, homing approaches fast, then backs
    /// off at the search feed until the endstop releases.
    pub search_fast: u32,
    /// Y endstop search feed rate (mm/min).
    pub search_feed_y: u32,
    /// Z endstop search feed rate (mm/min).
    #[cfg(feature = "z-axis")]
    pub search_feed_z: u32,
    /// Y coordinate of the minimum endstop, in micrometres.
    pub y_min_um: i32,
    /// Length of a search move, in micrometres. Must exceed the axis travel.
    pub search_travel_um: i32,
}

/// Default homing parameters.
pub const DEFAULT_HOMING: HomingConfig = HomingConfig {
    search_fast: 1200,
    search_feed_y: 50,
    #[cfg(feature = "z-axis")]
    search_feed_z: 50,
    y_min_um: 0,
    search_travel_um: 1_000_000,
};

/// Full machine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MachineConfig {
    /// Motor steps per metre of travel, indexed by motor.
    pub steps_per_m: [u32; AXIS_COUNT],
    pub homing: HomingConfig,
}

impl MachineConfig {
    /// Feed rate a freshly started interpreter uses until the first `F`.
    #[cfg(not(feature = "z-axis"))]
    #[must_use]
    pub const fn initial_feed(&self) -> u32 {
        self.homing.search_feed_y
    }

    /// Feed rate a freshly started interpreter uses until the first `F`.
    #[cfg(feature = "z-axis")]
    #[must_use]
    pub const fn initial_feed(&self) -> u32 {
        self.homing.search_feed_z
    }
}

/// Default configuration: 80 steps/mm belts on X/Y (1/16 microstepping,
/// 20-tooth GT2 pulley), 400 steps/mm leadscrew on Z.
pub const DEFAULT_MACHINE_CONFIG: MachineConfig = MachineConfig {
    #[cfg(not(feature = "z-axis"))]
    steps_per_m: [80_000, 80_000],
    #[cfg(feature = "z-axis")]
    steps_per_m: [80_000, 80_000, 400_000],
    homing: DEFAULT_HOMING,
};
