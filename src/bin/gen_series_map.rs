//! gen-series-map: build the ETF catalog (`all_etfs.json`) from the EDGAR
//! "series and classes" page of each registrant.
//!
//! ```text
//! USER_AGENT="Acme ops@acme.test" gen-series-map --out-file all_etfs.json
//! gen-series-map --process-file page.html -d
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use etf_holdings::catalog::StoredSeries;
use etf_holdings::config::AppSettings;
use etf_holdings::scrape::{fetch_series_page, parse_series_table};
use etf_holdings::store::write_json_atomic;
use etf_holdings::{init_tracing, FetchClient};

/// Registrants crawled when no `--cik` is given.
const DEFAULT_CIKS: &[u64] = &[36405, 52848, 105563, 106830, 736054, 857489, 891190, 1021882];

#[derive(Parser, Debug)]
#[command(
    name = "gen-series-map",
    about = "Generate the series-id → ETF ticker catalog from EDGAR",
    version
)]
struct Cli {
    /// Path to the output catalog. Created or overwritten.
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Parse a local HTML page and print the map instead of crawling.
    #[arg(long)]
    process_file: Option<PathBuf>,

    /// Registrant to crawl (repeatable). Defaults to the built-in list.
    #[arg(long = "cik")]
    ciks: Vec<u64>,

    /// Trace parser state transitions.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(if cli.debug {
        "etf_holdings=trace,gen_series_map=debug,warn"
    } else {
        "etf_holdings=info,gen_series_map=info,warn"
    });

    if let Some(path) = &cli.process_file {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let map = parse_series_table(0, &html)?;
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    let Some(out_file) = &cli.out_file else {
        bail!("either --out-file or --process-file is required");
    };

    let settings = AppSettings::from_env()?;
    let mut client = FetchClient::new(settings.client_settings())?;

    let ciks = if cli.ciks.is_empty() {
        DEFAULT_CIKS.to_vec()
    } else {
        cli.ciks.clone()
    };

    let mut output: BTreeMap<u64, Vec<StoredSeries>> = BTreeMap::new();
    for cik in ciks {
        let html = fetch_series_page(&mut client, &settings.archive_base, cik)
            .await
            .with_context(|| format!("fetching series page for cik {cik}"))?;
        let map = parse_series_table(cik, &html)
            .with_context(|| format!("parsing series page for cik {cik}"))?;
        tracing::info!(cik, etfs = map.len(), "series page parsed");

        let etfs = map
            .into_iter()
            .map(|(series_id, name)| StoredSeries { series_id, name })
            .collect();
        output.insert(cik, etfs);
    }

    write_json_atomic(out_file, &output)?;
    tracing::info!(path = %out_file.display(), ciks = output.len(), "catalog written");
    Ok(())
}
