//! CommandChannel: feeds a serial link through the line parser.

use core::future::Future;

use gcode_proto::{LineHandler, LineParser, LineStatus};

/// Acknowledgement for an accepted line.
pub const ACK_OK: &[u8] = b"ok\n";

/// Acknowledgement for a rejected line: the host should resend it.
pub const ACK_RESEND: &[u8] = b"rs\n";

/// Error type for serial link operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// UART/communication I/O error.
    Io,
    /// UART framing error.
    Framing,
    /// Receive buffer overrun; bytes were lost.
    Overrun,
    /// Connection lost.
    Disconnected,
}

/// Async byte-oriented serial link.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait SerialLink {
    /// Wait for and receive the next byte.
    fn read_byte(&mut self) -> impl Future<Output = Result<u8, LinkError>>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LinkError>>;
}

/// A channel that reads G-code from a serial link, executes each line and
/// acknowledges it.
///
/// # Error Handling
///
/// A receive error drops the partial line: the parser is reset so the next
/// byte starts a fresh line, and the host sees no acknowledgement for the
/// broken one.
pub struct CommandChannel<L, H> {
    link: L,
    handler: H,
    parser: LineParser,
}

impl<L: SerialLink, H: LineHandler> CommandChannel<L, H> {
    /// Create a new channel from a serial link and a line handler.
    pub fn new(link: L, handler: H) -> Self {
        Self {
            link,
            handler,
            parser: LineParser::new(),
        }
    }

    /// Run the channel, processing lines indefinitely.
    ///
    /// This method never returns under normal operation.
    pub async fn run(&mut self) -> ! {
        loop {
            let _ = self.process_line().await;
        }
    }

    /// Read bytes until one line completes, then acknowledge it.
    ///
    /// Blank lines complete silently and are not returned; the call keeps
    /// reading until a line is accepted or rejected.
    pub async fn process_line(&mut self) -> Result<LineStatus, ChannelError> {
        loop {
            let byte = match self.link.read_byte().await {
                Ok(byte) => byte,
                Err(e) => {
                    self.parser.reset();
                    warn!("link error, line dropped: {:?}", e);
                    return Err(ChannelError::Link(e));
                }
            };

            let ack = match self.parser.feed(byte, &mut self.handler) {
                LineStatus::Continuing => continue,
                LineStatus::Accepted => (LineStatus::Accepted, ACK_OK),
                LineStatus::Rejected => (LineStatus::Rejected, ACK_RESEND),
            };

            self.link.write(ack.1).await.map_err(ChannelError::Link)?;
            return Ok(ack.0);
        }
    }

    /// Get a reference to the parser.
    pub fn parser(&self) -> &LineParser {
        &self.parser
    }

    /// Get a reference to the line handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Get a mutable reference to the line handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Get a reference to the serial link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Get a mutable reference to the serial link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Decompose the channel into its link and handler.
    pub fn into_parts(self) -> (L, H) {
        (self.link, self.handler)
    }
}

/// Error type for channel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// Error from the serial link.
    Link(LinkError),
}
