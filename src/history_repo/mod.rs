// SQLite sample history. One row per acquisition cycle, append-only.
// Column names match existing datalogger files so an old sensor_data.db can be reused.

mod deadline;

pub use deadline::StorePolicy;

use crate::models::{CHANNEL_COUNT, ChannelReading, Sample, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

const INSERT_SAMPLE: &str = "INSERT INTO sensor_data
    (SPOD, utc_time, cst_time, ch0, ch1, ch2, ch3, ch4, ch5, ch6, ch7,
     adc0, adc1, adc2, adc3, adc4, adc5, adc6, adc7)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
            $12, $13, $14, $15, $16, $17, $18, $19)";

const SELECT_RECENT: &str = "SELECT SPOD, utc_time, cst_time, ch0, ch1, ch2, ch3, ch4, ch5, ch6, ch7,
    adc0, adc1, adc2, adc3, adc4, adc5, adc6, adc7
    FROM sensor_data ORDER BY id DESC LIMIT $1";

const SELECT_LATEST_UTC: &str =
    "SELECT utc_time FROM sensor_data ORDER BY utc_time DESC LIMIT 1";

pub struct HistoryRepo {
    pool: SqlitePool,
    policy: StorePolicy,
}

impl HistoryRepo {
    /// Connect to SQLite at `path`, create parent dir and DB if missing, enable WAL + pragmas.
    pub async fn connect(path: &str, policy: StorePolicy) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(policy.op_timeout)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(policy.op_timeout)
            .connect_with(opts)
            .await?;
        Ok(Self { pool, policy })
    }

    /// Create the table and index if they don't exist. Safe to run on every startup.
    #[instrument(skip(self), fields(repo = "history", operation = "init"))]
    pub async fn init(&self) -> anyhow::Result<()> {
        deadline::with_deadline(&self.policy, "init", move || self.create_schema()).await
    }

    async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                SPOD TEXT,
                utc_time TEXT,
                cst_time TEXT,
                ch0 REAL,
                ch1 REAL,
                ch2 REAL,
                ch3 REAL,
                ch4 REAL,
                ch5 REAL,
                ch6 REAL,
                ch7 REAL,
                adc0 INTEGER,
                adc1 INTEGER,
                adc2 INTEGER,
                adc3 INTEGER,
                adc4 INTEGER,
                adc5 INTEGER,
                adc6 INTEGER,
                adc7 INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sensor_data_utc_time ON sensor_data(utc_time)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Append one row. A failed channel is NULL in both its voltage and raw columns.
    #[instrument(skip(self, sample), fields(repo = "history", operation = "append"))]
    pub async fn append(&self, sample: &Sample) -> anyhow::Result<()> {
        deadline::with_deadline(&self.policy, "append", move || self.insert(sample)).await
    }

    async fn insert(&self, sample: &Sample) -> anyhow::Result<()> {
        let mut query = sqlx::query(INSERT_SAMPLE)
            .bind(sample.source_id.as_str())
            .bind(sample.utc_text())
            .bind(sample.local_text());
        for reading in &sample.channels {
            query = query.bind(reading.map(|r| r.millivolts));
        }
        for reading in &sample.channels {
            query = query.bind(reading.map(|r| i64::from(r.raw)));
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// UTC timestamp of the newest row by `utc_time`, or `None` when history is empty.
    #[instrument(skip(self), fields(repo = "history", operation = "latest_timestamp"))]
    pub async fn latest_timestamp(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let text = deadline::with_deadline(&self.policy, "latest_timestamp", move || async move {
            let row = sqlx::query_scalar::<_, Option<String>>(SELECT_LATEST_UTC)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, anyhow::Error>(row.flatten())
        })
        .await?;
        text.map(|s| parse_timestamp(&s).map(|t| t.and_utc()))
            .transpose()
    }

    /// Most recent `limit` rows, oldest first (inspection and tests).
    #[instrument(skip(self), fields(repo = "history", operation = "recent"))]
    pub async fn recent(&self, limit: u32) -> anyhow::Result<Vec<Sample>> {
        deadline::with_deadline(&self.policy, "recent", move || self.fetch_recent(limit)).await
    }

    async fn fetch_recent(&self, limit: u32) -> anyhow::Result<Vec<Sample>> {
        let rows = sqlx::query(SELECT_RECENT)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_sample_row(&row)?);
        }
        out.reverse();
        Ok(out)
    }

    fn parse_sample_row(row: &SqliteRow) -> anyhow::Result<Sample> {
        let source_id: Option<String> = row.try_get("SPOD")?;
        let utc: String = row.try_get("utc_time")?;
        let local: String = row.try_get("cst_time")?;

        let mut channels = [None; CHANNEL_COUNT];
        for (i, slot) in channels.iter_mut().enumerate() {
            let millivolts: Option<f64> = row.try_get(format!("ch{}", i).as_str())?;
            let raw: Option<i64> = row.try_get(format!("adc{}", i).as_str())?;
            *slot = match (millivolts, raw) {
                (Some(millivolts), Some(raw)) => Some(ChannelReading {
                    raw: u16::try_from(raw)
                        .map_err(|_| anyhow::anyhow!("adc{} out of range: {}", i, raw))?,
                    millivolts,
                }),
                _ => None,
            };
        }

        Ok(Sample {
            source_id: source_id.unwrap_or_default(),
            utc: parse_timestamp(&utc)?.and_utc(),
            local: parse_timestamp(&local)?,
            channels,
        })
    }

    /// Close the pool; later operations fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| anyhow::anyhow!("bad timestamp {:?}: {}", s, e))
}
