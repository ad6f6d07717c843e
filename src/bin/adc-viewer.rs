// Console viewer: samples all channels on the record cadence and prints one line per
// cycle. No datastore, no indicator.

use adclogger::models::Sample;
use adclogger::*;
use anyhow::Result;
use chrono::Utc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    telemetry::init();
    let app_config = config::AppConfig::load()?;

    let transport = hardware::open_spi(&app_config.adc.spi_device, app_config.adc.max_speed_hz)?;
    let mut adc = lifecycle::build_adc(transport, &app_config.adc);
    let zone = clock::LocalZone::from_offset_hours(app_config.clock.local_utc_offset_hours)?;
    let source_id = lifecycle::source_id_from_env();

    let mut tick = interval(Duration::from_millis(app_config.schedule.record_interval_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = lifecycle::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = tick.tick() => {
                let sample = Sample::new(source_id.as_str(), Utc::now(), &zone, adc.read_all());
                println!("{}", sample);
            }
        }
    }
    Ok(())
}
