// src/catalog.rs
//! ETF catalog (`all_etfs.json`): which registrants to crawl and which of
//! their series are ETFs worth storing.
//!
//! File shape, produced by `gen-series-map`:
//! `{"36405": [{"series_id": "S000002848", "name": "VTI"}, ...], ...}`

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSeries {
    pub series_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct EtfCatalog {
    by_cik: BTreeMap<u64, Vec<StoredSeries>>,
    by_series: HashMap<(u64, String), String>,
}

impl EtfCatalog {
    pub fn from_map(by_cik: BTreeMap<u64, Vec<StoredSeries>>) -> Self {
        let by_series = by_cik
            .iter()
            .flat_map(|(cik, series)| {
                series
                    .iter()
                    .map(move |s| ((*cik, s.series_id.clone()), s.name.clone()))
            })
            .collect();
        Self { by_cik, by_series }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading ETF catalog from {}", path.display()))?;
        let by_cik: BTreeMap<u64, Vec<StoredSeries>> = serde_json::from_str(&s)
            .with_context(|| format!("decoding ETF catalog {}", path.display()))?;
        let catalog = Self::from_map(by_cik);
        tracing::info!(
            ciks = catalog.by_cik.len(),
            etfs = catalog.by_series.len(),
            "ETF catalog loaded"
        );
        Ok(catalog)
    }

    /// Registrants in ascending CIK order.
    pub fn ciks(&self) -> Vec<u64> {
        self.by_cik.keys().copied().collect()
    }

    pub fn etfs_for(&self, cik: u64) -> Vec<&str> {
        self.by_cik
            .get(&cik)
            .map(|v| v.iter().map(|s| s.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn etf_for(&self, cik: u64, series_id: &str) -> Option<&str> {
        self.by_series
            .get(&(cik, series_id.to_string()))
            .map(String::as_str)
    }
}
