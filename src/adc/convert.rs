// Raw code to millivolts

/// Reference voltage of the target board, in millivolts.
pub const REFERENCE_MILLIVOLTS: f64 = 3300.0;
/// Highest code of a 10-bit converter.
pub const FULL_SCALE_CODE: u16 = 1023;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("raw code {raw} exceeds full scale {full_scale}")]
    OutOfRange { raw: u16, full_scale: u16 },
}

/// Linear calibration: `raw * reference_mv / full_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub reference_mv: f64,
    pub full_scale: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            reference_mv: REFERENCE_MILLIVOLTS,
            full_scale: FULL_SCALE_CODE,
        }
    }
}

impl Calibration {
    pub fn to_millivolts(&self, raw: u16, decimal_places: u32) -> Result<f64, ConversionError> {
        if raw > self.full_scale {
            return Err(ConversionError::OutOfRange {
                raw,
                full_scale: self.full_scale,
            });
        }
        let mv = f64::from(raw) * self.reference_mv / f64::from(self.full_scale);
        Ok(round_to(mv, decimal_places))
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
