// src/tracker.rs
//! # Fetched-date tracker
//! Remembers, per registrant (CIK), the inclusive filing-date range that has
//! already been fetched and stored, so the next run only asks for new filings.
//!
//! Each CIK has exactly one contiguous span. A gap left by an aborted pass is
//! treated as covered once a later pass records a span around it; the span
//! only ever grows.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filings::types::FetchDescriptor;

/// Inclusive `[start, end]` of ISO dates; both empty means nothing recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: String,
    pub end: String,
}

impl DateSpan {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty() || self.end.is_empty()
    }

    /// ISO dates compare lexically in chronological order.
    pub fn contains(&self, date: &str) -> bool {
        !self.is_empty() && date >= self.start.as_str() && date <= self.end.as_str()
    }

    /// Widen the span to also cover `[a, b]` (given in either order).
    pub fn extend(&mut self, a: &str, b: &str) {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        if self.start.is_empty() || start < self.start.as_str() {
            self.start = start.to_string();
        }
        if self.end.is_empty() || end > self.end.as_str() {
            self.end = end.to_string();
        }
    }

    pub fn extended(mut self, a: &str, b: &str) -> Self {
        self.extend(a, b);
        self
    }
}

/// Drop every descriptor whose filing date is already covered by `span`.
pub fn filter_backlog(backlog: Vec<FetchDescriptor>, span: &DateSpan) -> Vec<FetchDescriptor> {
    if span.is_empty() {
        return backlog;
    }
    backlog
        .into_iter()
        .filter(|d| !span.contains(&d.filing_date))
        .collect()
}

/// How far `span` may widen after a batch, given `(filing_date, fetched_ok)`
/// for every descriptor in it. Returns `None` when nothing can be added.
///
/// The result never covers a date with a failed filing: from the current span
/// it grows up and down through successful dates until the first failed
/// date on each side. With no span yet, the longest failure-free run of
/// dates wins (the newest on a tie).
pub fn covered_by_batch(span: &DateSpan, results: &[(&str, bool)]) -> Option<(String, String)> {
    let mut dates: BTreeMap<&str, bool> = BTreeMap::new();
    for &(date, ok) in results {
        let entry = dates.entry(date).or_insert(true);
        *entry &= ok;
    }

    if span.is_empty() {
        let mut best: Option<(&str, &str, usize)> = None;
        let mut run: Option<(&str, usize)> = None;
        for (&date, &ok) in &dates {
            if !ok {
                run = None;
                continue;
            }
            let (start, len) = match run {
                Some((start, len)) => (start, len + 1),
                None => (date, 1),
            };
            run = Some((start, len));
            if best.map_or(true, |(_, _, best_len)| len >= best_len) {
                best = Some((start, date, len));
            }
        }
        return best.map(|(a, b, _)| (a.to_string(), b.to_string()));
    }

    let end = dates
        .range::<str, _>((Bound::Excluded(span.end.as_str()), Bound::Unbounded))
        .take_while(|(_, &ok)| ok)
        .last()
        .map(|(&d, _)| d);
    let start = dates
        .range::<str, _>((Bound::Unbounded, Bound::Excluded(span.start.as_str())))
        .rev()
        .take_while(|(_, &ok)| ok)
        .last()
        .map(|(&d, _)| d);

    if start.is_none() && end.is_none() {
        return None;
    }
    Some((
        start.unwrap_or(span.start.as_str()).to_string(),
        end.unwrap_or(span.end.as_str()).to_string(),
    ))
}

/// Persisted `cik -> span` map (`fetched_map.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchedDates {
    spans: BTreeMap<u64, DateSpan>,
}

impl FetchedDates {
    /// A missing file means nothing has been fetched yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no fetched-date map yet, starting empty");
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading fetched-date map from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("decoding fetched-date map {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::store::write_json_atomic(path, self)
    }

    /// Empty span for a CIK seen for the first time.
    pub fn span(&self, cik: u64) -> DateSpan {
        self.spans.get(&cik).cloned().unwrap_or_default()
    }

    pub fn record(&mut self, cik: u64, a: &str, b: &str) -> &DateSpan {
        let span = self.spans.entry(cik).or_default();
        span.extend(a, b);
        span
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
