//! Streaming G-code parsing, fixed-point decoding and status serialization.
//!
//! This crate is the protocol half of the motion-control firmware:
//!
//! - **Types**: [`Parameter`] (one undecoded token), [`Target`] (a machine
//!   position in micrometres), [`Axis`]
//! - **Decoding**: [`decode_fixed`] turns accumulated digits into a scaled
//!   integer without floating point
//! - **Parsing**: [`LineParser`] consumes one byte per call and hands each
//!   complete line to a [`LineHandler`]
//! - **Serialization**: [`PositionReport`] and [`EndstopReport`] status lines
//!   via the [`Serialize`] trait
//!
//! # Example
//!
//! ```
//! use gcode_proto::{LineHandler, LineParser, LineStatus, Parameter, MM_TO_UM};
//!
//! struct FirstX(Option<i32>);
//!
//! impl LineHandler for FirstX {
//!     type Error = ();
//!
//!     fn process(&mut self, line: &[Parameter]) -> Result<(), ()> {
//!         self.0 = line.iter().find(|p| p.name == b'X').map(|p| p.decode(MM_TO_UM));
//!         Ok(())
//!     }
//! }
//!
//! let mut parser = LineParser::new();
//! let mut handler = FirstX(None);
//! for &byte in b"G1 X1.25\n" {
//!     let _ = parser.feed(byte, &mut handler);
//! }
//! assert_eq!(handler.0, Some(1250));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting and logging (for embedded targets)
//! - **`log`**: Route internal logging through the `log` facade
//! - **`heapless`**: Enable `serialize_to_vec()` methods
//! - **`embedded-io`**: Enable `serialize_io()` methods for I/O peripherals
//! - **`z-axis`**: Carry a third axis in [`Target`]
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod macros;

pub mod decimal;
mod fmt;
pub mod parser;
pub mod report;
pub mod types;

// Re-export types at crate root for convenience
pub use decimal::{decode_fixed, MM_TO_UM, NATIVE};
pub use parser::{LineHandler, LineParser, LineStatus, SyntaxError, MAX_PARAMETERS};
pub use report::{
    EndstopReport, PositionReport, Serialize, SerializeError, MAX_ENDSTOP_REPORT_SIZE,
    MAX_POSITION_REPORT_SIZE,
};
pub use types::{Axis, Parameter, Target, AXIS_COUNT};
