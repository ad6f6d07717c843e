// Worker tests: drive step() on a manual clock against a temp SQLite file

mod common;

use adclogger::indicator::{IndicatorMode, Level};
use adclogger::models::{CHANNEL_COUNT, Channel};
use adclogger::schedule::Task;
use adclogger::worker::WorkerConfig;
use chrono::TimeDelta;
use common::{FakeTransport, start_time, test_worker, worker_config};
use tempfile::TempDir;

const CODES: [u16; CHANNEL_COUNT] = [0, 1023, 512, 100, 200, 300, 400, 500];

/// Advance the clock by `poll_ms` and step, `steps` times.
async fn tick<T, I, C>(
    worker: &mut adclogger::worker::Worker<T, I, C>,
    clock: &adclogger::clock::ManualClock,
    steps: u32,
    poll_ms: i64,
) where
    T: adclogger::adc::AdcTransport,
    I: adclogger::indicator::Indicator,
    C: adclogger::clock::Clock,
{
    for _ in 0..steps {
        clock.advance(TimeDelta::milliseconds(poll_ms));
        worker.step().await;
    }
}

#[tokio::test]
async fn nothing_fires_on_first_step() {
    let dir = TempDir::new().unwrap();
    let (mut worker, _clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    worker.step().await;

    assert_eq!(worker.stats().records_fired, 0);
    assert_eq!(worker.stats().status_checks, 0);
    assert!(indicator.log.lock().unwrap().levels.is_empty());
}

#[tokio::test]
async fn both_cadences_fire_independently_over_ten_seconds() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, _indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 100, 100).await;

    let stats = worker.stats();
    assert_eq!(stats.records_fired, 10);
    assert_eq!(stats.samples_saved, 10);
    assert_eq!(stats.status_checks, 2);
    assert_eq!(stats.append_failures, 0);
}

#[tokio::test]
async fn three_seconds_of_polling_writes_three_rows_one_second_apart() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, _indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 30, 100).await;

    let rows = worker.history_repo().recent(10).await.unwrap();
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.source_id, "spod-test");
        assert_eq!(row.utc, start_time() + TimeDelta::seconds(i as i64 + 1));
        assert_eq!(row.channel_count(), CHANNEL_COUNT);
    }
    assert!(rows.windows(2).all(|w| w[0].utc < w[1].utc));

    let first = &rows[0];
    assert_eq!(first.reading(Channel::ALL[0]).unwrap().millivolts, 0.0);
    assert_eq!(first.reading(Channel::ALL[1]).unwrap().millivolts, 3300.0);
    assert_eq!(first.reading(Channel::ALL[2]).unwrap().millivolts, 1651.61);
    assert_eq!(first.reading(Channel::ALL[2]).unwrap().raw, 512);
    assert_eq!(first.local_text(), "2024-06-18 06:00:01");
}

#[tokio::test]
async fn slow_polling_never_double_fires() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, _indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    // 2.5s gaps: each step is overdue, but fires at most once per task
    tick(&mut worker, &clock, 4, 2500).await;

    assert_eq!(worker.stats().records_fired, 4);
    assert_eq!(worker.stats().status_checks, 2);
}

#[tokio::test]
async fn broken_channel_is_persisted_as_missing() {
    let dir = TempDir::new().unwrap();
    let transport = FakeTransport::new(CODES).with_broken(3);
    let (mut worker, clock, _indicator) = test_worker(&dir, transport, worker_config()).await;

    tick(&mut worker, &clock, 10, 100).await;

    assert_eq!(worker.stats().channel_failures, 1);
    assert_eq!(worker.stats().samples_saved, 1);
    let rows = worker.history_repo().recent(1).await.unwrap();
    assert_eq!(rows[0].channel_count(), CHANNEL_COUNT - 1);
    assert_eq!(rows[0].reading(Channel::ALL[3]), None);
    assert_eq!(rows[0].reading(Channel::ALL[4]).unwrap().raw, 200);
}

#[tokio::test]
async fn all_channels_failing_still_writes_a_row() {
    let dir = TempDir::new().unwrap();
    let mut transport = FakeTransport::new(CODES);
    for ch in 0..CHANNEL_COUNT {
        transport = transport.with_broken(ch);
    }
    let (mut worker, clock, _indicator) = test_worker(&dir, transport, worker_config()).await;

    tick(&mut worker, &clock, 10, 100).await;

    assert_eq!(worker.stats().channel_failures, CHANNEL_COUNT as u64);
    let rows = worker.history_repo().recent(1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].channel_count(), 0);
}

#[tokio::test]
async fn append_failure_drops_the_cycle_and_keeps_the_schedule() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    worker.history_repo().close().await;
    tick(&mut worker, &clock, 10, 100).await;

    assert_eq!(worker.stats().records_fired, 1);
    assert_eq!(worker.stats().append_failures, 1);
    assert_eq!(worker.stats().samples_saved, 0);
    assert_eq!(
        worker.schedule().last_fired(Task::Record),
        start_time() + TimeDelta::seconds(1)
    );

    // Status query fails too: indicator goes off, loop keeps going
    tick(&mut worker, &clock, 40, 100).await;
    assert_eq!(worker.stats().records_fired, 5);
    assert_eq!(worker.stats().status_checks, 1);
    assert_eq!(worker.stats().inactive_verdicts, 0);
    assert_eq!(indicator.log.lock().unwrap().last(), Some(Level::Off));
}

#[tokio::test]
async fn fresh_history_turns_indicator_on() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 50, 100).await;

    assert_eq!(worker.stats().status_checks, 1);
    assert_eq!(worker.stats().inactive_verdicts, 0);
    assert_eq!(indicator.log.lock().unwrap().levels, vec![Level::On]);
}

#[tokio::test]
async fn stale_history_turns_indicator_off() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 10, 100).await;
    assert_eq!(worker.check_status().await, Some(true));

    // Newest row is at t+1s; at t+7s it is 6s old
    clock.advance(TimeDelta::seconds(6));
    assert_eq!(worker.check_status().await, Some(false));
    assert_eq!(worker.stats().inactive_verdicts, 1);
    assert_eq!(indicator.log.lock().unwrap().last(), Some(Level::Off));
}

#[tokio::test]
async fn empty_history_is_inactive() {
    let dir = TempDir::new().unwrap();
    let config = WorkerConfig {
        record_interval_ms: 60_000,
        ..worker_config()
    };
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), config).await;

    tick(&mut worker, &clock, 50, 100).await;

    assert_eq!(worker.stats().records_fired, 0);
    assert_eq!(worker.stats().status_checks, 1);
    assert_eq!(worker.stats().inactive_verdicts, 1);
    assert_eq!(indicator.log.lock().unwrap().levels, vec![Level::Off]);
}

#[tokio::test]
async fn pulse_mode_flashes_on_then_off() {
    let dir = TempDir::new().unwrap();
    let config = WorkerConfig {
        indicator_mode: IndicatorMode::Pulse,
        pulse_ms: 5,
        ..worker_config()
    };
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), config).await;

    tick(&mut worker, &clock, 50, 100).await;

    assert_eq!(
        indicator.log.lock().unwrap().levels,
        vec![Level::On, Level::Off]
    );
}

#[tokio::test]
async fn indicator_fault_does_not_stop_recording() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;
    indicator.log.lock().unwrap().failing = true;

    tick(&mut worker, &clock, 100, 100).await;

    assert_eq!(worker.stats().samples_saved, 10);
    assert_eq!(worker.stats().status_checks, 2);
    assert!(indicator.log.lock().unwrap().levels.is_empty());
}

#[tokio::test]
async fn backwards_clock_step_delays_by_at_most_one_interval() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, _indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 30, 100).await;
    assert_eq!(worker.stats().records_fired, 3);

    clock.set(start_time() - TimeDelta::hours(1));
    worker.step().await;
    assert_eq!(worker.stats().records_fired, 3);

    tick(&mut worker, &clock, 10, 100).await;
    assert_eq!(worker.stats().records_fired, 4);
}

#[tokio::test]
async fn run_exits_on_shutdown_and_releases_once() {
    let dir = TempDir::new().unwrap();
    let (worker, _clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    shutdown_tx.send(()).unwrap();
    let stats = worker.run(shutdown_rx).await;

    assert_eq!(stats.records_fired, 0);
    let log = indicator.log.lock().unwrap();
    assert_eq!(log.last(), Some(Level::Off));
    assert_eq!(log.releases, 1);
}

#[tokio::test]
async fn run_exits_when_shutdown_sender_is_dropped() {
    let dir = TempDir::new().unwrap();
    let (worker, _clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    drop(shutdown_tx);
    worker.run(shutdown_rx).await;

    assert_eq!(indicator.log.lock().unwrap().releases, 1);
}

#[tokio::test]
async fn shutdown_closes_the_datastore_and_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let (mut worker, clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    tick(&mut worker, &clock, 20, 100).await;
    let stats = worker.shutdown().await;
    assert_eq!(stats.samples_saved, 2);
    assert_eq!(indicator.log.lock().unwrap().releases, 1);

    let reopened = common::temp_repo(&dir).await;
    assert_eq!(reopened.recent(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn dropping_worker_without_shutdown_releases_indicator() {
    let dir = TempDir::new().unwrap();
    let (worker, _clock, indicator) =
        test_worker(&dir, FakeTransport::new(CODES), worker_config()).await;

    drop(worker);

    let log = indicator.log.lock().unwrap();
    assert_eq!(log.levels, vec![Level::Off]);
    assert_eq!(log.releases, 1);
}

#[tokio::test]
async fn shutdown_during_running_loop_turns_indicator_off_and_closes_store() {
    let dir = TempDir::new().unwrap();
    let config = WorkerConfig {
        poll_interval_ms: 5,
        indicator_mode: IndicatorMode::Pulse,
        pulse_ms: 5,
        ..worker_config()
    };
    let (worker, clock, indicator) = test_worker(&dir, FakeTransport::new(CODES), config).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(worker.run(shutdown_rx));

    // Let the loop observe each clock step; 6s covers six records and one status check
    for _ in 0..6 {
        clock.advance(TimeDelta::seconds(1));
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
    }
    shutdown_tx.send(()).unwrap();
    let stats = handle.await.unwrap();

    assert!(stats.records_fired > 0);
    assert!(stats.status_checks > 0);
    {
        let log = indicator.log.lock().unwrap();
        assert_eq!(log.last(), Some(Level::Off));
        assert!(log.levels.contains(&Level::On));
        assert_eq!(log.releases, 1);
    }

    // Pool closed on shutdown: the file reopens and holds every saved row
    let reopened = common::temp_repo(&dir).await;
    let rows = reopened.recent(100).await.unwrap();
    assert_eq!(rows.len() as u64, stats.samples_saved);
    assert!(stats.samples_saved > 0);
}
