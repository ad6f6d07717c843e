// Shared test helpers: scripted converter, recording indicator, temp datastore

#![allow(dead_code)]

use adclogger::adc::{AdcTransport, Calibration, FRAME_LEN, Mcp3008, TransportError};
use adclogger::clock::{LocalZone, ManualClock};
use adclogger::history_repo::{HistoryRepo, StorePolicy};
use adclogger::indicator::{Indicator, IndicatorError, IndicatorMode, Level};
use adclogger::models::CHANNEL_COUNT;
use adclogger::worker::{Worker, WorkerConfig, WorkerDeps};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Answers channel `n` with `codes[n]`; channels listed in `broken` always fail.
pub struct FakeTransport {
    pub codes: [u16; CHANNEL_COUNT],
    pub broken: Vec<usize>,
}

impl FakeTransport {
    pub fn new(codes: [u16; CHANNEL_COUNT]) -> Self {
        Self {
            codes,
            broken: Vec::new(),
        }
    }

    pub fn with_broken(mut self, channel: usize) -> Self {
        self.broken.push(channel);
        self
    }
}

impl AdcTransport for FakeTransport {
    fn transfer(&mut self, command: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], TransportError> {
        let ch = usize::from((command[1] >> 4) - 8);
        if self.broken.contains(&ch) {
            return Err(TransportError::Device(format!("channel {} unplugged", ch)));
        }
        let code = self.codes[ch];
        Ok([0x00, (code >> 8) as u8, (code & 0xFF) as u8])
    }
}

/// Everything the indicator was asked to do, shared with the test body.
#[derive(Debug, Default)]
pub struct IndicatorLog {
    pub levels: Vec<Level>,
    pub releases: usize,
    pub failing: bool,
}

impl IndicatorLog {
    pub fn last(&self) -> Option<Level> {
        self.levels.last().copied()
    }
}

#[derive(Clone, Default)]
pub struct FakeIndicator {
    pub log: Arc<Mutex<IndicatorLog>>,
}

impl Indicator for FakeIndicator {
    fn set(&mut self, level: Level) -> Result<(), IndicatorError> {
        let mut log = self.log.lock().unwrap();
        if log.failing {
            return Err(IndicatorError::Device("led driver fault".into()));
        }
        log.levels.push(level);
        Ok(())
    }

    fn release(&mut self) -> Result<(), IndicatorError> {
        self.log.lock().unwrap().releases += 1;
        Ok(())
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 18, 12, 0, 0).unwrap()
}

pub fn cst() -> LocalZone {
    LocalZone::Fixed(FixedOffset::west_opt(6 * 3600).unwrap())
}

pub fn worker_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval_ms: 100,
        record_interval_ms: 1000,
        status_interval_ms: 5000,
        stale_after_secs: 5,
        indicator_mode: IndicatorMode::Steady,
        pulse_ms: 100,
    }
}

pub async fn temp_repo(dir: &TempDir) -> HistoryRepo {
    let path = dir.path().join("sensor_data.db");
    let repo = HistoryRepo::connect(path.to_str().unwrap(), StorePolicy::default())
        .await
        .unwrap();
    repo.init().await.unwrap();
    repo
}

/// Worker on a manual clock at `start_time()`, with a fresh temp datastore.
pub async fn test_worker(
    dir: &TempDir,
    transport: FakeTransport,
    config: WorkerConfig,
) -> (Worker<FakeTransport, FakeIndicator, ManualClock>, ManualClock, FakeIndicator) {
    let clock = ManualClock::new(start_time());
    let indicator = FakeIndicator::default();
    let worker = Worker::new(
        WorkerDeps {
            adc: Mcp3008::new(transport, Calibration::default()),
            history_repo: temp_repo(dir).await,
            indicator: indicator.clone(),
            clock: clock.clone(),
            source_id: "spod-test".into(),
            zone: cst(),
        },
        config,
    );
    (worker, clock, indicator)
}
