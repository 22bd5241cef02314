// src/store.rs
//! On-disk dataset layout under the data directory:
//!
//! - `fetched_map.json`  : per-CIK fetched date spans
//! - `all/<ETF>.json`    : every stored snapshot, newest first
//! - `latest/<ETF>.json` : newest snapshot only

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::filings::types::Index;
use crate::tracker::DateSpan;

pub type IndexMap = BTreeMap<String, Vec<Index>>;

/// Write JSON through a temp file + rename so a crash never leaves half a file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec(value).context("serializing JSON")?;
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(&bytes)
        .with_context(|| format!("writing {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("syncing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Insert `index`, replacing an existing snapshot of the same series and date.
pub fn merge_index(list: &mut Vec<Index>, index: Index) {
    match list
        .iter_mut()
        .find(|i| i.series_id == index.series_id && i.filing_date == index.filing_date)
    {
        Some(existing) => *existing = index,
        None => list.push(index),
    }
}

pub fn sort_newest_first(list: &mut [Index]) {
    list.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
}

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn fetched_map_path(&self) -> PathBuf {
        self.root.join("fetched_map.json")
    }

    pub fn all_path(&self, etf: &str) -> PathBuf {
        self.root.join("all").join(format!("{etf}.json"))
    }

    pub fn latest_path(&self, etf: &str) -> PathBuf {
        self.root.join("latest").join(format!("{etf}.json"))
    }

    /// Create `all/` and `latest/` before any fetch happens.
    pub fn ensure_layout(&self) -> Result<()> {
        for sub in ["all", "latest"] {
            let dir = self.root.join(sub);
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    /// Existing snapshots for `etfs`. Without a recorded span the files on
    /// disk are not trusted and the map starts empty.
    pub fn load_index_map(&self, etfs: &[&str], span: &DateSpan) -> Result<IndexMap> {
        let mut map = IndexMap::new();
        if span.is_empty() {
            return Ok(map);
        }
        for etf in etfs {
            let path = self.all_path(etf);
            if !path.exists() {
                // New ETFs appear in the catalog before their first snapshot.
                tracing::warn!(etf, path = %path.display(), "no stored snapshots for ETF");
                continue;
            }
            let s = fs::read_to_string(&path)
                .with_context(|| format!("reading snapshots for {etf}"))?;
            let list: Vec<Index> = serde_json::from_str(&s)
                .with_context(|| format!("decoding snapshots for {etf} ({})", path.display()))?;
            map.insert(etf.to_string(), list);
        }
        Ok(map)
    }

    /// Write `all/<etf>.json` (everything) and `latest/<etf>.json` (first entry).
    pub fn write_etf(&self, etf: &str, indexes: &[Index]) -> Result<()> {
        let Some(latest) = indexes.first() else {
            return Ok(());
        };
        write_json_atomic(&self.all_path(etf), indexes)?;
        write_json_atomic(&self.latest_path(etf), latest)?;
        Ok(())
    }
}
