// Library for the datalogger and viewer binaries and for tests

pub mod adc;
pub mod clock;
pub mod config;
pub mod hardware;
pub mod history_repo;
pub mod indicator;
pub mod lifecycle;
pub mod models;
pub mod schedule;
pub mod staleness;
pub mod telemetry;
pub mod version;
pub mod worker;
