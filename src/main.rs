//! EDGAR N-PORT holdings crawler. Binary entrypoint.
//!
//! Reads the ETF catalog, fetches every new NPORT-P filing of each registrant
//! within the EDGAR rate limits and writes per-ETF snapshots under the data dir.

use anyhow::{Context, Result};

use etf_holdings::config::AppSettings;
use etf_holdings::{init_tracing, EtfCatalog, FetchedDates, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing("etf_holdings=info,warn");

    let settings = AppSettings::from_env()?;
    tracing::info!(
        rps = settings.rps,
        volume_capacity = settings.volume_capacity,
        volume_period_secs = settings.volume_period.as_secs(),
        data_dir = %settings.data_dir.display(),
        "starting crawl"
    );

    let catalog = EtfCatalog::load(&settings.catalog_path)?;
    let mut pipeline = Pipeline::from_settings(&settings, catalog)?;

    let map_path = pipeline.store().fetched_map_path();
    let mut fetched = FetchedDates::load(&map_path)?;

    let summary = pipeline
        .run(&mut fetched)
        .await
        .context("crawl aborted")?;

    if summary.total_failed() > 0 {
        tracing::warn!(
            failed = summary.total_failed(),
            "some holdings documents failed; they will be retried next run"
        );
    }
    Ok(())
}
