// Dump recent sensor_data rows as JSON.
//
// Usage: cargo run --example dump_samples -- [DB_PATH] [LIMIT]
//   DB_PATH  default: ./data/sensor_data.db
//   LIMIT    default: 5

use adclogger::history_repo::{HistoryRepo, StorePolicy};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("./data/sensor_data.db");
    let limit: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);

    let repo = HistoryRepo::connect(path, StorePolicy::default()).await?;
    let samples = repo.recent(limit).await?;

    println!("{}", serde_json::to_string_pretty(&samples)?);
    repo.close().await;
    Ok(())
}
