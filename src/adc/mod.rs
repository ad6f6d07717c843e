// 10-bit, 8-channel SPI converter (MCP3008 framing): command frames, response decoding,
// per-channel reads with bounded retries, and calibration to millivolts.

mod convert;
mod transport;

pub use convert::{Calibration, ConversionError, FULL_SCALE_CODE, REFERENCE_MILLIVOLTS, round_to};
pub use transport::{AdcTransport, FRAME_LEN, SpiTransport, TransportError};

use crate::models::{CHANNEL_COUNT, Channel, ChannelReading};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("channel {channel}: transfer failed after {attempts} attempt(s): {source}")]
    Transport {
        channel: Channel,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("channel {channel}: {source}")]
    Conversion {
        channel: Channel,
        #[source]
        source: ConversionError,
    },
}

/// Start bit, then single-ended mode + channel in the high nibble, then a padding byte.
pub fn command_frame(channel: Channel) -> [u8; FRAME_LEN] {
    [0x01, (8 + channel.index()) << 4, 0x00]
}

/// Low 2 bits of the second byte are bits 9..8; the third byte is bits 7..0.
pub fn extract_code(b1: u8, b2: u8) -> u16 {
    (u16::from(b1 & 0x03) << 8) + u16::from(b2)
}

pub fn decode_response(frame: [u8; FRAME_LEN]) -> u16 {
    extract_code(frame[1], frame[2])
}

pub struct Mcp3008<T> {
    transport: T,
    calibration: Calibration,
    decimal_places: u32,
    transfer_attempts: u32,
}

impl<T: AdcTransport> Mcp3008<T> {
    pub fn new(transport: T, calibration: Calibration) -> Self {
        Self {
            transport,
            calibration,
            decimal_places: 2,
            transfer_attempts: 1,
        }
    }

    pub fn with_decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = places;
        self
    }

    /// Transfers per channel before the read is reported as failed (minimum 1).
    pub fn with_transfer_attempts(mut self, attempts: u32) -> Self {
        self.transfer_attempts = attempts.max(1);
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn read_channel(&mut self, channel: Channel) -> Result<u16, AcquisitionError> {
        let command = command_frame(channel);
        let mut attempt = 1;
        loop {
            match self.transport.transfer(command) {
                Ok(frame) => return Ok(decode_response(frame)),
                Err(source) if attempt >= self.transfer_attempts => {
                    return Err(AcquisitionError::Transport {
                        channel,
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    tracing::debug!(channel = channel.index(), attempt, error = %e, "retrying transfer");
                    attempt += 1;
                }
            }
        }
    }

    pub fn read_reading(&mut self, channel: Channel) -> Result<ChannelReading, AcquisitionError> {
        let raw = self.read_channel(channel)?;
        let millivolts = self
            .calibration
            .to_millivolts(raw, self.decimal_places)
            .map_err(|source| AcquisitionError::Conversion { channel, source })?;
        Ok(ChannelReading { raw, millivolts })
    }

    /// Reads channels 0..7 in order. A failed channel is logged and left as `None`.
    pub fn read_all(&mut self) -> [Option<ChannelReading>; CHANNEL_COUNT] {
        let mut out = [None; CHANNEL_COUNT];
        for channel in Channel::ALL {
            match self.read_reading(channel) {
                Ok(reading) => out[channel.as_usize()] = Some(reading),
                Err(e) => warn!(
                    component = "adc",
                    channel = channel.index(),
                    error = %e,
                    "channel read failed; omitted from sample"
                ),
            }
        }
        out
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
