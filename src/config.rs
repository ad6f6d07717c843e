use serde::Deserialize;

use crate::indicator::IndicatorMode;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub adc: AdcConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    /// Deadline for a single append or query.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
    /// Tries per operation before the failure is reported to the loop.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_op_timeout_ms() -> u64 {
    2000
}

fn default_attempts() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    pub spi_device: String,
    pub max_speed_hz: u32,
    pub reference_mv: f64,
    pub full_scale: u16,
    pub decimal_places: u32,
    pub transfer_attempts: u32,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            spi_device: "/dev/spidev0.0".into(),
            max_speed_hz: 1_350_000,
            reference_mv: crate::adc::REFERENCE_MILLIVOLTS,
            full_scale: crate::adc::FULL_SCALE_CODE,
            decimal_places: 2,
            transfer_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// GPIO line number (BCM). 25 is physical header pin 22.
    pub gpio: u32,
    pub mode: IndicatorMode,
    /// On-time of one flash in pulse mode.
    pub pulse_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            gpio: 25,
            mode: IndicatorMode::Steady,
            pulse_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Sleep between loop iterations; bounds CPU use and firing jitter.
    pub poll_interval_ms: u64,
    pub record_interval_ms: u64,
    pub status_interval_ms: u64,
    /// The newest row must be younger than this for the indicator to show active.
    pub stale_after_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            record_interval_ms: 1000,
            status_interval_ms: 5000,
            stale_after_secs: 5,
        }
    }
}

/// Upper bound for `schedule.stale_after_secs` (one day).
pub const MAX_STALE_AFTER_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClockConfig {
    /// Fixed offset for the local-time column; host zone when unset.
    pub local_utc_offset_hours: Option<i32>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("read config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.op_timeout_ms > 0,
            "database.op_timeout_ms must be > 0, got {}",
            self.database.op_timeout_ms
        );
        anyhow::ensure!(
            self.database.attempts > 0,
            "database.attempts must be > 0, got {}",
            self.database.attempts
        );
        anyhow::ensure!(
            !self.adc.spi_device.is_empty(),
            "adc.spi_device must be non-empty"
        );
        anyhow::ensure!(
            self.adc.max_speed_hz > 0,
            "adc.max_speed_hz must be > 0, got {}",
            self.adc.max_speed_hz
        );
        anyhow::ensure!(
            self.adc.reference_mv.is_finite() && self.adc.reference_mv > 0.0,
            "adc.reference_mv must be a positive number, got {}",
            self.adc.reference_mv
        );
        anyhow::ensure!(
            self.adc.full_scale > 0,
            "adc.full_scale must be > 0, got {}",
            self.adc.full_scale
        );
        anyhow::ensure!(
            self.adc.decimal_places <= 6,
            "adc.decimal_places must be <= 6, got {}",
            self.adc.decimal_places
        );
        anyhow::ensure!(
            self.adc.transfer_attempts > 0,
            "adc.transfer_attempts must be > 0, got {}",
            self.adc.transfer_attempts
        );
        anyhow::ensure!(
            self.indicator.pulse_ms > 0,
            "indicator.pulse_ms must be > 0, got {}",
            self.indicator.pulse_ms
        );
        anyhow::ensure!(
            self.schedule.poll_interval_ms > 0,
            "schedule.poll_interval_ms must be > 0, got {}",
            self.schedule.poll_interval_ms
        );
        anyhow::ensure!(
            self.schedule.record_interval_ms > 0,
            "schedule.record_interval_ms must be > 0, got {}",
            self.schedule.record_interval_ms
        );
        anyhow::ensure!(
            self.schedule.status_interval_ms > 0,
            "schedule.status_interval_ms must be > 0, got {}",
            self.schedule.status_interval_ms
        );
        anyhow::ensure!(
            self.schedule.stale_after_secs.saturating_mul(1000) > self.schedule.record_interval_ms,
            "schedule.stale_after_secs ({}s) must exceed schedule.record_interval_ms ({}ms)",
            self.schedule.stale_after_secs,
            self.schedule.record_interval_ms
        );
        anyhow::ensure!(
            self.schedule.stale_after_secs <= MAX_STALE_AFTER_SECS,
            "schedule.stale_after_secs must be <= {}, got {}",
            MAX_STALE_AFTER_SECS,
            self.schedule.stale_after_secs
        );
        if let Some(hours) = self.clock.local_utc_offset_hours {
            anyhow::ensure!(
                (-23..=23).contains(&hours),
                "clock.local_utc_offset_hours must be within -23..=23, got {}",
                hours
            );
        }
        Ok(())
    }
}
