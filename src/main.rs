use adclogger::*;
use anyhow::Result;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    telemetry::init();
    info!(name = version::NAME, version = version::VERSION, "starting");

    let app_config = config::AppConfig::load()?;

    let transport = hardware::open_spi(&app_config.adc.spi_device, app_config.adc.max_speed_hz)?;
    let indicator = hardware::SysfsLed::open(app_config.indicator.gpio)?;
    let source_id = lifecycle::source_id_from_env();

    let worker = lifecycle::start(
        &app_config,
        transport,
        indicator,
        clock::SystemClock,
        source_id,
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        lifecycle::shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    worker.run(shutdown_rx).await;
    Ok(())
}
