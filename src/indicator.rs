// Status indicator: one binary output reflecting whether logging is current.

use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    On,
    Off,
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on { Level::On } else { Level::Off }
    }
}

/// How an active verdict is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorMode {
    /// On while active, off otherwise.
    #[default]
    Steady,
    /// A short flash per active status check.
    Pulse,
}

#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    #[error("gpio error: {0:?}")]
    Gpio(ErrorKind),
    #[error("device error: {0}")]
    Device(String),
}

pub trait Indicator {
    fn set(&mut self, level: Level) -> Result<(), IndicatorError>;

    /// Hand the output line back to the system. Leaves the indicator off.
    fn release(&mut self) -> Result<(), IndicatorError> {
        self.set(Level::Off)
    }
}

/// Drives an embedded-hal output pin, active high.
pub struct PinIndicator<P> {
    pin: P,
    level: Option<Level>,
}

impl<P: OutputPin> PinIndicator<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, level: None }
    }

    /// Last level successfully written, if any.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

impl<P: OutputPin> Indicator for PinIndicator<P> {
    fn set(&mut self, level: Level) -> Result<(), IndicatorError> {
        let result = match level {
            Level::On => self.pin.set_high(),
            Level::Off => self.pin.set_low(),
        };
        result.map_err(|e| IndicatorError::Gpio(e.kind()))?;
        self.level = Some(level);
        Ok(())
    }
}
