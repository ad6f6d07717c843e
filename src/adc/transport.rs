// Bus boundary: exchange one 3-byte command frame for one 3-byte response frame.

use embedded_hal::spi::{Error as _, ErrorKind, SpiDevice};

/// Length of both the command and the response frame.
pub const FRAME_LEN: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("spi bus error: {0:?}")]
    Spi(ErrorKind),
    #[error("device error: {0}")]
    Device(String),
}

/// One full-duplex transaction per call; the converter protocol lives above this.
pub trait AdcTransport {
    fn transfer(&mut self, command: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], TransportError>;
}

/// Adapts any embedded-hal SPI device (chip select handled by the device).
pub struct SpiTransport<D> {
    device: D,
}

impl<D: SpiDevice> SpiTransport<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: SpiDevice> AdcTransport for SpiTransport<D> {
    fn transfer(&mut self, command: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], TransportError> {
        let mut frame = command;
        self.device
            .transfer_in_place(&mut frame)
            .map_err(|e| TransportError::Spi(e.kind()))?;
        Ok(frame)
    }
}
