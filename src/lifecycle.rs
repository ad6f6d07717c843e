// Startup and shutdown bracketing the control loop.
// Startup order: transport opened, indicator off, datastore + schema, source identifier.

use crate::adc::{AdcTransport, Calibration, Mcp3008};
use crate::clock::{Clock, LocalZone};
use crate::config::{AdcConfig, AppConfig, DatabaseConfig};
use crate::history_repo::{HistoryRepo, StorePolicy};
use crate::indicator::{Indicator, Level};
use crate::worker::{Worker, WorkerConfig, WorkerDeps};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable that overrides the source identifier.
pub const SOURCE_ID_ENV: &str = "HOSTNAME";
/// Value some login setups leave in the override; treated as unset.
pub const SOURCE_ID_PLACEHOLDER: &str = "unknown_user";
/// Last resort when neither the override nor the host name is available.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Override if set and meaningful, else the host name, else [`UNKNOWN_SOURCE`].
pub fn resolve_source_id(
    override_value: Option<String>,
    host_name: impl FnOnce() -> Option<String>,
) -> String {
    let usable = |s: &String| !s.trim().is_empty() && s != SOURCE_ID_PLACEHOLDER;
    override_value
        .filter(usable)
        .or_else(|| host_name().filter(usable))
        .unwrap_or_else(|| UNKNOWN_SOURCE.into())
}

/// Resolve from the process environment, falling back to the system host name.
pub fn source_id_from_env() -> String {
    resolve_source_id(std::env::var(SOURCE_ID_ENV).ok(), sysinfo::System::host_name)
}

impl From<&DatabaseConfig> for StorePolicy {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            op_timeout: Duration::from_millis(config.op_timeout_ms),
            attempts: config.attempts,
        }
    }
}

/// Open the datastore and ensure the schema. Any failure here is fatal to the caller.
pub async fn open_history(config: &DatabaseConfig) -> anyhow::Result<HistoryRepo> {
    let repo = HistoryRepo::connect(&config.path, StorePolicy::from(config))
        .await
        .map_err(|e| anyhow::anyhow!("open datastore {}: {:#}", config.path, e))?;
    repo.init()
        .await
        .map_err(|e| anyhow::anyhow!("create schema in {}: {:#}", config.path, e))?;
    Ok(repo)
}

pub fn build_adc<T: AdcTransport>(transport: T, config: &AdcConfig) -> Mcp3008<T> {
    let calibration = Calibration {
        reference_mv: config.reference_mv,
        full_scale: config.full_scale,
    };
    Mcp3008::new(transport, calibration)
        .with_decimal_places(config.decimal_places)
        .with_transfer_attempts(config.transfer_attempts)
}

/// Assemble a worker from an already-open transport and indicator.
/// On a setup fault the indicator is released before the error is returned.
pub async fn start<T, I, C>(
    config: &AppConfig,
    transport: T,
    mut indicator: I,
    clock: C,
    source_id: String,
) -> anyhow::Result<Worker<T, I, C>>
where
    T: AdcTransport,
    I: Indicator,
    C: Clock,
{
    if let Err(e) = indicator.set(Level::Off) {
        warn!(component = "indicator", error = %e, "failed to reset indicator");
    }

    let zone = match LocalZone::from_offset_hours(config.clock.local_utc_offset_hours) {
        Ok(zone) => zone,
        Err(e) => {
            if let Err(release_err) = indicator.release() {
                warn!(component = "indicator", error = %release_err, "failed to release indicator");
            }
            return Err(e);
        }
    };

    let history_repo = match open_history(&config.database).await {
        Ok(repo) => repo,
        Err(e) => {
            if let Err(release_err) = indicator.release() {
                warn!(component = "indicator", error = %release_err, "failed to release indicator");
            }
            return Err(e);
        }
    };

    info!(source_id = %source_id, database = %config.database.path, "datalogger ready");

    Ok(Worker::new(
        WorkerDeps {
            adc: build_adc(transport, &config.adc),
            history_repo,
            indicator,
            clock,
            source_id,
            zone,
        },
        WorkerConfig::from(config),
    ))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
