// Linux bindings: spidev bus for the converter, sysfs GPIO line for the status LED.

use crate::adc::SpiTransport;
use crate::indicator::{Indicator, IndicatorError, Level, PinIndicator};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{SpidevDevice, SysfsPin};

/// Open and configure the SPI device: mode 0, 8-bit words, `max_speed_hz`.
pub fn open_spi(path: &str, max_speed_hz: u32) -> anyhow::Result<SpiTransport<SpidevDevice>> {
    let mut device = SpidevDevice::open(path)
        .map_err(|e| anyhow::anyhow!("open SPI device {}: {:?}", path, e))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(max_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    device
        .0
        .configure(&options)
        .map_err(|e| anyhow::anyhow!("configure SPI device {}: {}", path, e))?;
    Ok(SpiTransport::new(device))
}

/// Status LED on a sysfs GPIO line; the line is exported on open and unexported on release.
pub struct SysfsLed {
    line: u32,
    pin: PinIndicator<SysfsPin>,
}

impl SysfsLed {
    /// Export the line and configure it as an output driven low.
    pub fn open(line: u32) -> anyhow::Result<Self> {
        let pin = SysfsPin::new(u64::from(line));
        pin.0
            .export()
            .map_err(|e| anyhow::anyhow!("export gpio {}: {}", line, e))?;
        pin.0
            .set_direction(Direction::Low)
            .map_err(|e| anyhow::anyhow!("set gpio {} as output: {}", line, e))?;
        Ok(Self {
            line,
            pin: PinIndicator::new(pin),
        })
    }
}

impl Indicator for SysfsLed {
    fn set(&mut self, level: Level) -> Result<(), IndicatorError> {
        self.pin.set(level)
    }

    fn release(&mut self) -> Result<(), IndicatorError> {
        self.pin.set(Level::Off)?;
        self.pin
            .pin()
            .0
            .unexport()
            .map_err(|e| IndicatorError::Device(format!("unexport gpio {}: {}", self.line, e)))
    }
}
