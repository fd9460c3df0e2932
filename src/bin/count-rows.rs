//! prints how much data the readings table holds

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use sensor_hub::store::{PostgresStore, Store, TimeoutStore, STATS_WINDOW};

/// temp, humidity, pressure, altitude
const METEOROLOGICAL_CHANNELS: u64 = 4;

#[derive(Debug, Parser)]
struct Args {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "DATABASE_AUTH_TOKEN")]
    auth_token: Option<String>,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let timeout = Duration::from_millis(args.timeout_ms);
    let store = PostgresStore::connect_lazy(
        &args.database_url,
        args.auth_token.as_deref(),
        1,
        timeout,
    )
    .context("failed to configure database connection")?;
    let store = TimeoutStore::new(store, timeout);

    let rows = store.count().await.context("failed to count rows")?;
    let window = store
        .window_aggregate(STATS_WINDOW)
        .await
        .context("failed to aggregate last 24h")?;

    println!(
        "There are {rows} rows and {} meteorological readings!",
        rows * METEOROLOGICAL_CHANNELS
    );
    println!(
        "Last 24h: {} rows, max {:.1}°C, min {:.1}°C",
        window.count, window.max_temp, window.min_temp
    );

    Ok(())
}
