// src/fetch/mod.rs
pub mod batch;
pub mod client;
pub mod clock;
pub mod error;
pub mod gate;

pub use batch::{select_batch, BatchError, VolumeBudget};
pub use client::{ClientSettings, FetchClient};
pub use clock::{Clock, FakeClock, TokioClock};
pub use error::{ConfigError, FetchError};
pub use gate::Gate;

use metrics::describe_counter;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up once a recorder is installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("edgar_requests_total", "Requests sent to EDGAR.");
        describe_counter!(
            "edgar_request_errors_total",
            "Requests that failed in transport or returned a non-2xx status."
        );
        describe_counter!(
            "edgar_gate_waits_total",
            "Waits imposed by a pacing or volume gate."
        );
        describe_counter!(
            "edgar_holdings_failures_total",
            "Holdings documents that could not be fetched or decoded."
        );
    });
}
