// Control loop: one polling loop driving two independent cadences.
// Record task: read all channels, append one sample. Status task: staleness check, drive the LED.
// Cleanup (indicator off, datastore closed) runs exactly once: on shutdown, or on drop.

use crate::adc::{AdcTransport, Mcp3008};
use crate::clock::{Clock, LocalZone};
use crate::config::AppConfig;
use crate::history_repo::HistoryRepo;
use crate::indicator::{Indicator, IndicatorMode, Level};
use crate::models::{CHANNEL_COUNT, Sample, TIMESTAMP_FORMAT};
use crate::schedule::{Schedule, Task};
use crate::staleness;
use chrono::TimeDelta;
use tokio::sync::oneshot;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Hardware, datastore, and identity the worker owns for its lifetime.
pub struct WorkerDeps<T, I, C> {
    pub adc: Mcp3008<T>,
    pub history_repo: HistoryRepo,
    pub indicator: I,
    pub clock: C,
    pub source_id: String,
    pub zone: LocalZone,
}

/// Worker timing and indicator behaviour.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    pub record_interval_ms: u64,
    pub status_interval_ms: u64,
    pub stale_after_secs: u64,
    pub indicator_mode: IndicatorMode,
    pub pulse_ms: u64,
}

impl From<&AppConfig> for WorkerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval_ms: config.schedule.poll_interval_ms,
            record_interval_ms: config.schedule.record_interval_ms,
            status_interval_ms: config.schedule.status_interval_ms,
            stale_after_secs: config.schedule.stale_after_secs,
            indicator_mode: config.indicator.mode,
            pulse_ms: config.indicator.pulse_ms,
        }
    }
}

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub records_fired: u64,
    pub samples_saved: u64,
    pub append_failures: u64,
    pub channel_failures: u64,
    pub status_checks: u64,
    pub inactive_verdicts: u64,
}

fn millis(ms: u64) -> TimeDelta {
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX)
}

pub struct Worker<T, I: Indicator, C> {
    adc: Mcp3008<T>,
    history_repo: HistoryRepo,
    indicator: I,
    clock: C,
    source_id: String,
    zone: LocalZone,
    config: WorkerConfig,
    stale_after: TimeDelta,
    schedule: Schedule,
    stats: WorkerStats,
    released: bool,
}

impl<T: AdcTransport, I: Indicator, C: Clock> Worker<T, I, C> {
    /// Both cadences are anchored at the clock's current time: nothing fires on the first step.
    pub fn new(deps: WorkerDeps<T, I, C>, config: WorkerConfig) -> Self {
        let WorkerDeps {
            adc,
            history_repo,
            indicator,
            clock,
            source_id,
            zone,
        } = deps;
        let schedule = Schedule::new(
            clock.now(),
            millis(config.record_interval_ms),
            millis(config.status_interval_ms),
        );
        let stale_after = millis(config.stale_after_secs.saturating_mul(1000));
        Self {
            adc,
            history_repo,
            indicator,
            clock,
            source_id,
            zone,
            config,
            stale_after,
            schedule,
            stats: WorkerStats::default(),
            released: false,
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn history_repo(&self) -> &HistoryRepo {
        &self.history_repo
    }

    /// One loop iteration: fire whichever tasks are due. Never fails; faults are logged.
    pub async fn step(&mut self) {
        let now = self.clock.now();
        if self.schedule.rebase(now) {
            warn!(component = "schedule", "wall clock moved backwards; cadences re-anchored");
        }
        if self.schedule.is_due(Task::Record, now) {
            self.record(now).await;
            self.schedule.mark_fired(Task::Record, now);
        }
        if self.schedule.is_due(Task::Status, now) {
            self.check_status().await;
            self.schedule.mark_fired(Task::Status, now);
        }
    }

    /// Acquire channels 0..7 and append the sample. Failed channels are stored as NULL;
    /// a failed append drops the cycle.
    pub async fn record(&mut self, now: chrono::DateTime<chrono::Utc>) -> Option<Sample> {
        self.stats.records_fired += 1;
        let channels = self.adc.read_all();
        let sample = Sample::new(self.source_id.clone(), now, &self.zone, channels);
        self.stats.channel_failures += (CHANNEL_COUNT - sample.channel_count()) as u64;

        match self.history_repo.append(&sample).await {
            Ok(()) => {
                self.stats.samples_saved += 1;
                info!("{}", sample);
                Some(sample)
            }
            Err(e) => {
                self.stats.append_failures += 1;
                warn!(
                    component = "history",
                    operation = "append",
                    error = %e,
                    "sample not persisted; cycle dropped"
                );
                None
            }
        }
    }

    /// Staleness check against the newest persisted row. `None` when the query failed,
    /// in which case the indicator is switched off.
    pub async fn check_status(&mut self) -> Option<bool> {
        self.stats.status_checks += 1;
        let latest = match self.history_repo.latest_timestamp().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(
                    component = "history",
                    operation = "latest_timestamp",
                    error = %e,
                    "status check failed"
                );
                self.drive(Level::Off);
                return None;
            }
        };

        let active = staleness::is_active(latest, self.clock.now(), self.stale_after);
        if !active {
            self.stats.inactive_verdicts += 1;
            info!(
                latest = %latest
                    .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_else(|| "none".into()),
                "Recording status is inactive"
            );
        }
        self.show(active).await;
        Some(active)
    }

    async fn show(&mut self, active: bool) {
        match (self.config.indicator_mode, active) {
            (IndicatorMode::Pulse, true) => {
                self.drive(Level::On);
                tokio::time::sleep(Duration::from_millis(self.config.pulse_ms)).await;
                self.drive(Level::Off);
            }
            _ => self.drive(Level::from(active)),
        }
    }

    fn drive(&mut self, level: Level) {
        if let Err(e) = self.indicator.set(level) {
            warn!(
                component = "indicator",
                level = ?level,
                error = %e,
                "indicator update failed; keeping last state"
            );
        }
    }

    /// Poll until `shutdown_rx` fires (or its sender is dropped), then clean up.
    /// A step in progress always completes before the signal is observed.
    pub async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) -> WorkerStats {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        info!(
            source_id = %self.source_id,
            record_interval_ms = self.config.record_interval_ms,
            status_interval_ms = self.config.status_interval_ms,
            stale_after_secs = self.config.stale_after_secs,
            "worker started"
        );
        loop {
            self.step().await;
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(poll) => {}
            }
        }
        self.shutdown().await
    }

    /// Indicator off, indicator line released, datastore closed.
    pub async fn shutdown(mut self) -> WorkerStats {
        info!("Cleaning up indicator and database connections");
        self.release_indicator();
        self.history_repo.close().await;
        info!(
            records_fired = self.stats.records_fired,
            samples_saved = self.stats.samples_saved,
            append_failures = self.stats.append_failures,
            channel_failures = self.stats.channel_failures,
            status_checks = self.stats.status_checks,
            inactive_verdicts = self.stats.inactive_verdicts,
            "app stats"
        );
        self.stats
    }
}

impl<T, I: Indicator, C> Worker<T, I, C> {
    fn release_indicator(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.indicator.set(Level::Off) {
            warn!(component = "indicator", error = %e, "failed to switch indicator off");
        }
        if let Err(e) = self.indicator.release() {
            warn!(component = "indicator", error = %e, "failed to release indicator");
        }
    }
}

impl<T, I: Indicator, C> Drop for Worker<T, I, C> {
    fn drop(&mut self) {
        if !self.released {
            warn!("worker dropped without shutdown; releasing indicator");
            self.release_indicator();
        }
    }
}
