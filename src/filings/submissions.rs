// src/filings/submissions.rs
//! Per-registrant submission index (`data.sec.gov/submissions/CIK##########.json`).

use chrono::NaiveDate;
use serde::Deserialize;

use crate::fetch::{FetchClient, FetchError};
use crate::filings::types::FetchDescriptor;

pub const NPORT_FORM: &str = "NPORT-P";

#[derive(Debug, Deserialize)]
pub struct AllSubmissions {
    #[serde(default)]
    pub cik: String,
    pub filings: Filings,
}

#[derive(Debug, Deserialize)]
pub struct Filings {
    pub recent: RecentFilings,
}

/// Parallel arrays, one entry per filing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
}

pub fn submissions_url(data_base: &str, cik: u64) -> String {
    format!("{}/submissions/CIK{:010}.json", data_base.trim_end_matches('/'), cik)
}

pub fn strip_dashes(accession: &str) -> String {
    accession.chars().filter(|c| *c != '-').collect()
}

fn is_iso_date(s: &str) -> bool {
    s.len() == 10 && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Turn the index into a backlog of N-PORT-P filings, newest first.
pub fn to_backlog(cik: u64, all: &AllSubmissions) -> Vec<FetchDescriptor> {
    let recent = &all.filings.recent;
    let (n_acc, n_date, n_form) = (
        recent.accession_number.len(),
        recent.filing_date.len(),
        recent.form.len(),
    );
    if n_acc != n_date || n_acc != n_form {
        tracing::warn!(
            cik,
            accessions = n_acc,
            dates = n_date,
            forms = n_form,
            "submission index columns differ in length; extra entries ignored"
        );
    }
    let mut out: Vec<FetchDescriptor> = recent
        .accession_number
        .iter()
        .zip(&recent.filing_date)
        .zip(&recent.form)
        .filter(|(_, form)| form.as_str() == NPORT_FORM)
        .filter_map(|((accession, date), _)| {
            if !is_iso_date(date) {
                tracing::warn!(cik, accession = %accession, date = %date, "skipping filing with malformed date");
                return None;
            }
            Some(FetchDescriptor {
                cik,
                accession_number: strip_dashes(accession),
                filing_date: date.clone(),
            })
        })
        .collect();

    // Stable, so same-day filings keep the index order.
    out.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    out
}

pub async fn fetch_backlog(
    client: &mut FetchClient,
    data_base: &str,
    cik: u64,
) -> Result<Vec<FetchDescriptor>, FetchError> {
    let url = submissions_url(data_base, cik);
    tracing::info!(cik, %url, "fetching submission index");
    let all: AllSubmissions = client.decode_json(&url).await?;
    Ok(to_backlog(cik, &all))
}
