// src/pipeline.rs
//! One crawl over every registrant in the catalog.
//!
//! Per CIK: submission index → drop already-covered dates → cut a batch that
//! fits the volume window → fetch and validate each holdings document →
//! merge into the stored snapshots → extend the fetched-date span over the
//! successful dates, stopping short of any date with a failed filing.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use metrics::counter;

use crate::catalog::EtfCatalog;
use crate::config::AppSettings;
use crate::fetch::{select_batch, FetchClient};
use crate::filings::holdings::fetch_index;
use crate::filings::submissions::fetch_backlog;
use crate::filings::validate::validate_index;
use crate::store::{merge_index, sort_newest_first, DataStore};
use crate::tracker::{covered_by_batch, filter_backlog, FetchedDates};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The submission index could not be fetched or decoded.
    SubmissionsUnavailable,
    /// Nothing outside the recorded span.
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CikOutcome {
    Skipped(SkipReason),
    Fetched {
        /// Holdings documents fetched and decoded.
        fetched: usize,
        /// Holdings documents that failed to fetch or decode.
        failed: usize,
        /// Decoded snapshots whose series is not in the catalog.
        unmatched: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<(u64, CikOutcome)>,
}

impl RunSummary {
    pub fn outcome(&self, cik: u64) -> Option<&CikOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == cik)
            .map(|(_, o)| o)
    }

    pub fn total_fetched(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                CikOutcome::Fetched { fetched, .. } => *fetched,
                CikOutcome::Skipped(_) => 0,
            })
            .sum()
    }

    pub fn total_failed(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                CikOutcome::Fetched { failed, .. } => *failed,
                CikOutcome::Skipped(_) => 0,
            })
            .sum()
    }
}

pub struct Pipeline {
    client: FetchClient,
    catalog: EtfCatalog,
    store: DataStore,
    data_base: String,
    archive_base: String,
}

impl Pipeline {
    pub fn new(
        client: FetchClient,
        catalog: EtfCatalog,
        store: DataStore,
        data_base: impl Into<String>,
        archive_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            catalog,
            store,
            data_base: data_base.into(),
            archive_base: archive_base.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings, catalog: EtfCatalog) -> Result<Self> {
        let client = FetchClient::new(settings.client_settings())?;
        Ok(Self::new(
            client,
            catalog,
            DataStore::new(&settings.data_dir),
            settings.data_base.clone(),
            settings.archive_base.clone(),
        ))
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Crawl every catalog CIK in ascending order. Per-request failures are
    /// logged and counted; storage errors and an unsplittable backlog abort.
    pub async fn run(&mut self, fetched: &mut FetchedDates) -> Result<RunSummary> {
        self.store.ensure_layout()?;
        let mut summary = RunSummary::default();
        for cik in self.catalog.ciks() {
            let outcome = self
                .process_cik(cik, fetched)
                .await
                .with_context(|| format!("processing cik {cik}"))?;
            summary.outcomes.push((cik, outcome));
        }
        tracing::info!(
            ciks = summary.outcomes.len(),
            fetched = summary.total_fetched(),
            failed = summary.total_failed(),
            "run finished"
        );
        Ok(summary)
    }

    async fn process_cik(&mut self, cik: u64, fetched: &mut FetchedDates) -> Result<CikOutcome> {
        let span = fetched.span(cik);
        let etfs = self.catalog.etfs_for(cik);
        let mut index_map = self.store.load_index_map(&etfs, &span)?;

        let backlog = match fetch_backlog(&mut self.client, &self.data_base, cik).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, cik, "skipping cik: submission index unavailable");
                return Ok(CikOutcome::Skipped(SkipReason::SubmissionsUnavailable));
            }
        };

        let backlog = filter_backlog(backlog, &span);
        if backlog.is_empty() {
            tracing::info!(cik, start = %span.start, end = %span.end, "up to date");
            return Ok(CikOutcome::Skipped(SkipReason::UpToDate));
        }

        let batch = select_batch(&mut self.client, backlog).await?;
        let (Some(newest), Some(oldest)) = (batch.first(), batch.last()) else {
            return Ok(CikOutcome::Skipped(SkipReason::UpToDate));
        };
        let (newest, oldest) = (newest.filing_date.clone(), oldest.filing_date.clone());
        tracing::info!(cik, filings = batch.len(), %oldest, %newest, "fetching batch");

        let (mut ok, mut failed, mut unmatched) = (0usize, 0usize, 0usize);
        let mut touched = BTreeSet::new();
        let mut results: Vec<(&str, bool)> = Vec::with_capacity(batch.len());
        for descriptor in &batch {
            let index = match fetch_index(&mut self.client, &self.archive_base, descriptor).await {
                Ok(ix) => ix,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        cik,
                        accession = %descriptor.accession_number,
                        decode = e.is_decode(),
                        "holdings fetch failed"
                    );
                    counter!("edgar_holdings_failures_total").increment(1);
                    failed += 1;
                    results.push((descriptor.filing_date.as_str(), false));
                    continue;
                }
            };
            ok += 1;
            results.push((descriptor.filing_date.as_str(), true));

            let report = validate_index(&index, self.catalog.etf_for(cik, &index.series_id));
            report.log();
            match report.etf_name {
                Some(etf) => {
                    merge_index(index_map.entry(etf.clone()).or_default(), index);
                    touched.insert(etf);
                }
                None => unmatched += 1,
            }
        }

        for etf in &touched {
            if let Some(list) = index_map.get_mut(etf) {
                sort_newest_first(list);
                self.store
                    .write_etf(etf, list)
                    .with_context(|| format!("writing snapshots for {etf}"))?;
            }
        }

        if failed > 0 {
            tracing::warn!(cik, failed, "batch had failures; their dates stay outside the span");
        }
        // Dates with a failed filing are never covered, so the next run retries them.
        match covered_by_batch(&span, &results) {
            Some((start, end)) => {
                let span = fetched.record(cik, &start, &end).clone();
                fetched
                    .save(&self.store.fetched_map_path())
                    .context("saving fetched-date map")?;
                tracing::info!(cik, start = %span.start, end = %span.end, "span extended");
            }
            None => tracing::warn!(cik, "fetched-date span left unchanged"),
        }

        Ok(CikOutcome::Fetched {
            fetched: ok,
            failed,
            unmatched,
        })
    }
}
