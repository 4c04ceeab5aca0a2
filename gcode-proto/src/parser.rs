//! Streaming G-code line parser.
//!
//! Bytes are fed one at a time; the parser assembles up to
//! [`MAX_PARAMETERS`] tokens per line and hands the finished line to a
//! [`LineHandler`] when it sees `\n` or `\r`.
//!
//! # Line Format
//!
//! ```text
//! <letter><code> [<letter>[-]<digits>[.<digits>]]...\n
//! ```
//!
//! - Tokens are separated by spaces or tabs; whitespace before the line
//!   ending is a syntax error
//! - Letters are case-insensitive (folded to uppercase)
//! - The first token is the command (`G1`, `M114`), the rest are arguments
//! - A line may hold at most 8 tokens; a ninth rejects the line
//!
//! # Example
//!
//! ```
//! use gcode_proto::{LineHandler, LineParser, LineStatus, Parameter};
//!
//! struct Count(usize);
//!
//! impl LineHandler for Count {
//!     type Error = ();
//!
//!     fn process(&mut self, line: &[Parameter]) -> Result<(), ()> {
//!         self.0 = line.len();
//!         Ok(())
//!     }
//! }
//!
//! let mut parser = LineParser::new();
//! let mut handler = Count(0);
//! let mut status = LineStatus::Continuing;
//! for &byte in b"G1 X10 Y-2.5\n" {
//!     status = parser.feed(byte, &mut handler);
//! }
//! assert_eq!(status, LineStatus::Accepted);
//! assert_eq!(handler.0, 3);
//! ```

use crate::types::Parameter;

/// Maximum number of tokens in one line (command plus seven arguments).
pub const MAX_PARAMETERS: usize = 8;

/// Result of feeding one byte.
///
/// Only a line terminator produces anything other than `Continuing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineStatus {
    /// The line is still being assembled (or was blank).
    Continuing,
    /// The line parsed and its handler succeeded.
    Accepted,
    /// The line was malformed or its handler refused it.
    Rejected,
}

/// Why a line failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyntaxError {
    /// A byte that cannot appear at this point of a token.
    UnexpectedByte(u8),
    /// A letter followed directly by the end of the line.
    MissingNumber,
    /// Whitespace between the last token and the end of the line.
    TrailingWhitespace,
    /// A second decimal point inside one number.
    MisplacedDecimalPoint,
    /// More digits than a `u32` mantissa can hold.
    NumberOverflow,
    /// More than [`MAX_PARAMETERS`] tokens on one line.
    TooManyParameters,
}

/// Consumer of completed lines.
///
/// `line[0]` is always the command token; the rest are its arguments in the
/// order they were written.
pub trait LineHandler {
    /// Error type returned for lines the handler cannot execute.
    type Error;

    /// Execute one complete line.
    fn process(&mut self, line: &[Parameter]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitLetter,
    AwaitSign,
    AccumulateDigits,
    SyntaxError,
}

/// What the current byte asks the parser to do.
enum Step {
    Continue,
    /// Terminator on an empty line.
    Blank,
    /// Terminator after this many complete tokens.
    Execute(usize),
    /// Terminator on a malformed line.
    Reject,
}

/// Byte-at-a-time G-code parser.
///
/// One parser serves one input stream. It is not reentrant: bytes of two
/// lines must never be interleaved.
#[derive(Debug, Clone)]
pub struct LineParser {
    params: [Parameter; MAX_PARAMETERS],
    current: usize,
    state: State,
}

impl LineParser {
    /// Create a parser waiting for the first letter of a line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: [Parameter::EMPTY; MAX_PARAMETERS],
            current: 0,
            state: State::AwaitLetter,
        }
    }

    /// Discard the current line and clear every parameter slot.
    pub fn reset(&mut self) {
        self.params = [Parameter::EMPTY; MAX_PARAMETERS];
        self.current = 0;
        self.state = State::AwaitLetter;
    }

    /// All parameter slots, including unused ones.
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter; MAX_PARAMETERS] {
        &self.params
    }

    /// True if the parser is between lines with nothing buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitLetter
            && self.current == 0
            && self.params.iter().all(|p| *p == Parameter::EMPTY)
    }

    /// Consume one byte.
    ///
    /// When `byte` terminates a well-formed line, `handler` runs before this
    /// returns. The parser is reset after every terminator whatever the
    /// outcome.
    pub fn feed<H: LineHandler>(&mut self, byte: u8, handler: &mut H) -> LineStatus {
        match self.step(byte) {
            Step::Continue => LineStatus::Continuing,
            Step::Blank => {
                self.reset();
                LineStatus::Continuing
            }
            Step::Execute(count) => {
                let result = handler.process(&self.params[..count]);
                self.reset();
                match result {
                    Ok(()) => LineStatus::Accepted,
                    Err(_) => {
                        debug!("line refused by handler");
                        LineStatus::Rejected
                    }
                }
            }
            Step::Reject => {
                self.reset();
                LineStatus::Rejected
            }
        }
    }

    fn step(&mut self, byte: u8) -> Step {
        let result = match self.state {
            State::AwaitLetter => self.await_letter(byte),
            State::AwaitSign => self.await_sign(byte),
            State::AccumulateDigits => self.accumulate_digits(byte),
            State::SyntaxError => Ok(if is_line_ending(byte) {
                Step::Reject
            } else {
                Step::Continue
            }),
        };

        result.unwrap_or_else(|error| {
            warn!("syntax error in slot {}: {:?}", self.current, error);
            self.state = State::SyntaxError;
            if is_line_ending(byte) {
                Step::Reject
            } else {
                Step::Continue
            }
        })
    }

    fn await_letter(&mut self, byte: u8) -> Result<Step, SyntaxError> {
        match byte {
            b' ' | b'\t' => Ok(Step::Continue),
            b'\n' | b'\r' if self.current == 0 => Ok(Step::Blank),
            b'\n' | b'\r' => Err(SyntaxError::TrailingWhitespace),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let slot = self
                    .params
                    .get_mut(self.current)
                    .ok_or(SyntaxError::TooManyParameters)?;
                slot.name = byte.to_ascii_uppercase();
                self.state = State::AwaitSign;
                Ok(Step::Continue)
            }
            _ => Err(SyntaxError::UnexpectedByte(byte)),
        }
    }

    fn await_sign(&mut self, byte: u8) -> Result<Step, SyntaxError> {
        match byte {
            b'-' => {
                self.params[self.current].negative = true;
                self.state = State::AccumulateDigits;
                Ok(Step::Continue)
            }
            b'0'..=b'9' => {
                self.state = State::AccumulateDigits;
                self.accumulate_digits(byte)
            }
            b'\n' | b'\r' => Err(SyntaxError::MissingNumber),
            _ => Err(SyntaxError::UnexpectedByte(byte)),
        }
    }

    fn accumulate_digits(&mut self, byte: u8) -> Result<Step, SyntaxError> {
        let slot = &mut self.params[self.current];
        match byte {
            b'0'..=b'9' => {
                slot.mantissa = slot
                    .mantissa
                    .checked_mul(10)
                    .and_then(|m| m.checked_add(u32::from(byte - b'0')))
                    .ok_or(SyntaxError::NumberOverflow)?;
                if slot.fraction_digits != 0 {
                    slot.fraction_digits = slot.fraction_digits.saturating_add(1);
                }
                Ok(Step::Continue)
            }
            // 1 marks "point seen, no digits yet"
            b'.' if slot.fraction_digits == 0 => {
                slot.fraction_digits = 1;
                Ok(Step::Continue)
            }
            b'.' => Err(SyntaxError::MisplacedDecimalPoint),
            b' ' | b'\t' => {
                self.current += 1;
                self.state = State::AwaitLetter;
                Ok(Step::Continue)
            }
            b'\n' | b'\r' => Ok(Step::Execute(self.current + 1)),
            _ => Err(SyntaxError::UnexpectedByte(byte)),
        }
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn is_line_ending(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}
