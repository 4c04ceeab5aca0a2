//! UART serial link carrying G-code in and acknowledgements out.
//!
//! Status lines produced while a command runs (M114, M119) are queued on a
//! [`StatusQueue`] and written ahead of the line's acknowledgement, so the
//! host always sees a report before the `ok` that ends it.
//!
//! # Pins
//!
//! Uses UART1:
//! - GPIO 8: TX
//! - GPIO 9: RX

use embassy_rp::uart::{Async, Error as UartError, UartRx, UartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use motion_core::{LinkError, SerialLink, StatusError, StatusLine, StatusSink};

/// Number of status lines that may wait for transmission.
pub const STATUS_QUEUE_DEPTH: usize = 4;

/// Queue of status lines between the interpreter and the UART.
pub type StatusQueue = Channel<CriticalSectionRawMutex, StatusLine, STATUS_QUEUE_DEPTH>;

/// Convert UART errors to [`LinkError`].
///
/// This is a helper function instead of a `From` impl to avoid orphan rule issues
/// (both `UartError` and `LinkError` are defined in external crates).
#[inline]
fn uart_error_to_link_error(e: UartError) -> LinkError {
    match e {
        UartError::Framing => LinkError::Framing,
        UartError::Overrun => LinkError::Overrun,
        _ => LinkError::Io,
    }
}

/// Full-duplex UART link.
pub struct UartLink<'d> {
    tx: UartTx<'d, Async>,
    rx: UartRx<'d, Async>,
    status: Receiver<'static, CriticalSectionRawMutex, StatusLine, STATUS_QUEUE_DEPTH>,
}

impl<'d> UartLink<'d> {
    /// Create a link from the two halves of a split UART.
    #[must_use]
    pub fn new(tx: UartTx<'d, Async>, rx: UartRx<'d, Async>, status: &'static StatusQueue) -> Self {
        Self {
            tx,
            rx,
            status: status.receiver(),
        }
    }
}

impl SerialLink for UartLink<'_> {
    async fn read_byte(&mut self) -> Result<u8, LinkError> {
        let mut byte = [0u8; 1];
        self.rx
            .read(&mut byte)
            .await
            .map_err(uart_error_to_link_error)?;
        Ok(byte[0])
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), LinkError> {
        while let Ok(line) = self.status.try_receive() {
            self.tx
                .write(&line)
                .await
                .map_err(uart_error_to_link_error)?;
        }
        self.tx.write(data).await.map_err(uart_error_to_link_error)
    }
}

/// Status sink feeding a [`StatusQueue`].
pub struct QueuedStatus {
    sender: Sender<'static, CriticalSectionRawMutex, StatusLine, STATUS_QUEUE_DEPTH>,
}

impl QueuedStatus {
    #[must_use]
    pub fn new(queue: &'static StatusQueue) -> Self {
        Self {
            sender: queue.sender(),
        }
    }
}

impl StatusSink for QueuedStatus {
    fn send_status(&mut self, line: &[u8]) -> Result<(), StatusError> {
        let line = StatusLine::from_slice(line).map_err(|_| StatusError::BufferFull)?;
        self.sender
            .try_send(line)
            .map_err(|_| StatusError::BufferFull)
    }
}
