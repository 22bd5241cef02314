// src/scrape/mod.rs
pub mod series_table;

pub use series_table::{fetch_series_page, parse_series_table, series_page_url};
