// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod filings;
pub mod pipeline;
pub mod scrape;
pub mod store;
pub mod tracker;

// ---- Re-exports for stable public API ----
pub use crate::catalog::EtfCatalog;
pub use crate::fetch::{FetchClient, FetchError};
pub use crate::pipeline::{CikOutcome, Pipeline, RunSummary};
pub use crate::tracker::{DateSpan, FetchedDates};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber once per process.
/// `RUST_LOG` overrides `default_filter`; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
