//! Status line serialization.
//!
//! This module provides the [`Serialize`] trait for the status lines the
//! firmware sends back over the serial link.
//!
//! # Formats
//!
//! ## Position Report (M114)
//!
//! ```text
//! X:<mm>,Y:<mm>,F:<feed>\n
//! ```
//!
//! Coordinates are printed in millimetres with three decimals; the feed
//! rate is an unsigned integer.
//!
//! ## Endstop Report (M119)
//!
//! ```text
//! X:<0|1>,Y:<0|1>\n
//! ```
//!
//! Only axes with a configured minimum endstop are listed.
//!
//! # Example
//!
//! ```
//! use gcode_proto::{PositionReport, Serialize, Target};
//!
//! let mut position = Target::ORIGIN;
//! position.axis[0] = 10_000;
//! position.feed = 3000;
//!
//! let mut buf = [0u8; 64];
//! let len = PositionReport(position).serialize(&mut buf).unwrap();
//! assert_eq!(&buf[..len], b"X:10.000,Y:0.000,F:3000\n");
//! ```

use crate::fmt::{write_milli, write_u32};
use crate::types::{Axis, Target, AXIS_COUNT};

/// Maximum size of a serialized position report.
///
/// Breakdown: X:(2) + mm(12) + ,Y:(3) + mm(12) + ,F:(3) + feed(10) + \n(1) = 43
/// We use 48 for safety margin.
pub const MAX_POSITION_REPORT_SIZE: usize = 48;

/// Maximum size of a serialized endstop report.
///
/// Breakdown: per axis letter(1) + colon(1) + state(1) + comma(1), \n(1) = 13 for three axes
/// We use 16 for safety margin.
pub const MAX_ENDSTOP_REPORT_SIZE: usize = 16;

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the serialized line.
    BufferTooSmall,
    /// A write operation failed (for I/O adapters).
    WriteError,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::WriteError => write!(f, "write error"),
        }
    }
}

/// Cursor over an output buffer.
struct LineBuf<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> LineBuf<'a> {
    #[inline]
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn write(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
    }

    #[inline]
    fn write_slice(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    #[inline]
    fn write_milli(&mut self, value: i32) {
        let mut tmp = [0u8; 12];
        let len = write_milli(&mut tmp, value);
        self.write_slice(&tmp[..len]);
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        let mut tmp = [0u8; 10];
        let len = write_u32(&mut tmp, value);
        self.write_slice(&tmp[..len]);
    }

    /// Terminate the line and return its length.
    #[inline]
    fn finish(mut self) -> usize {
        self.write(b'\n');
        self.pos
    }
}

/// Current machine position, as reported by M114.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionReport(pub Target);

/// Minimum endstop states, as reported by M119.
///
/// `None` marks an axis without a configured endstop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndstopReport(pub [Option<bool>; AXIS_COUNT]);

impl EndstopReport {
    /// True if no axis has an endstop to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

/// Extension trait for serializing status lines.
pub trait Serialize {
    /// Largest line this type can produce.
    const MAX_SIZE: usize;

    /// Serialize to the provided buffer.
    ///
    /// Returns the number of bytes written on success.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer is shorter
    /// than [`Serialize::MAX_SIZE`].
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError>;

    /// Serialize to a `heapless::Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if `N` is not large enough.
    #[cfg(feature = "heapless")]
    fn serialize_to_vec<const N: usize>(&self) -> Result<heapless::Vec<u8, N>, SerializeError> {
        let mut vec = heapless::Vec::new();
        // Resize to full capacity to allow serialize() to write
        vec.resize(N, 0)
            .map_err(|_| SerializeError::BufferTooSmall)?;
        let len = self.serialize(&mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }

    /// Serialize to an `embedded_io::Write` implementation.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::WriteError`] if the write fails.
    #[cfg(feature = "embedded-io")]
    fn serialize_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), SerializeError>;
}

impl Serialize for PositionReport {
    const MAX_SIZE: usize = MAX_POSITION_REPORT_SIZE;

    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        if buf.len() < Self::MAX_SIZE {
            return Err(SerializeError::BufferTooSmall);
        }

        let mut lb = LineBuf::new(buf);
        lb.write_slice(b"X:");
        lb.write_milli(self.0[Axis::X]);
        lb.write_slice(b",Y:");
        lb.write_milli(self.0[Axis::Y]);
        lb.write_slice(b",F:");
        lb.write_u32(self.0.feed);
        Ok(lb.finish())
    }

    #[cfg(feature = "embedded-io")]
    fn serialize_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        let mut buf = [0u8; MAX_POSITION_REPORT_SIZE];
        let len = self.serialize(&mut buf)?;
        writer
            .write_all(&buf[..len])
            .map_err(|_| SerializeError::WriteError)
    }
}

impl Serialize for EndstopReport {
    const MAX_SIZE: usize = MAX_ENDSTOP_REPORT_SIZE;

    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        if buf.len() < Self::MAX_SIZE {
            return Err(SerializeError::BufferTooSmall);
        }

        let mut lb = LineBuf::new(buf);
        let mut first = true;
        for axis in Axis::ALL {
            let Some(triggered) = self.0[axis.index()] else {
                continue;
            };
            if !first {
                lb.write(b',');
            }
            first = false;
            lb.write(axis.letter());
            lb.write(b':');
            lb.write(if triggered { b'1' } else { b'0' });
        }
        Ok(lb.finish())
    }

    #[cfg(feature = "embedded-io")]
    fn serialize_io<W: embedded_io::Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        let mut buf = [0u8; MAX_ENDSTOP_REPORT_SIZE];
        let len = self.serialize(&mut buf)?;
        writer
            .write_all(&buf[..len])
            .map_err(|_| SerializeError::WriteError)
    }
}
