// src/scrape/series_table.rs
//! Series → ETF ticker map from the EDGAR company "series and classes" page
//! (`cgi-bin/browse-edgar?scd=series&CIK=...&action=getcompany`).
//!
//! The page is one table: a row per series (`S000…`), followed by rows per
//! share class (`C000…`, class name, ticker). We walk the token stream and
//! pick the ticker cell that follows an "ETF Shares" class name.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::fetch::{FetchClient, FetchError};

const ETF_CLASS_NAME: &str = "ETF Shares";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Start(String),
    End(String),
    Text(String),
}

/// Minimal HTML tokenizer: tags (lower-cased names) and trimmed, entity-decoded text.
/// Comments, doctypes and processing instructions are dropped.
pub fn tokenize(html: &str) -> Vec<Token> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|<(/?)([A-Za-z][A-Za-z0-9]*)[^>]*>|([^<]+)|<")
            .expect("tokenizer regex")
    });

    let mut out = Vec::new();
    for caps in re.captures_iter(html) {
        if let Some(name) = caps.get(2) {
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            out.push(if closing {
                Token::End(name)
            } else {
                Token::Start(name)
            });
        } else if let Some(text) = caps.get(3) {
            let decoded = html_escape::decode_html_entities(text.as_str());
            let trimmed = decoded.trim();
            if !trimmed.is_empty() {
                out.push(Token::Text(trimmed.to_string()));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideTable,
    InTableRow,
    FoundSeries,
    FoundEtf,
    InEtfNameCell,
    WaitingForNextSeries,
}

fn is_series_id(text: &str) -> bool {
    text.len() == 10 && text.starts_with('S')
}

fn transition(state: &mut State, next: State) {
    tracing::trace!(from = ?*state, to = ?next, "series table transition");
    *state = next;
}

/// Parse the page into `series_id -> ETF ticker`.
pub fn parse_series_table(cik: u64, html: &str) -> Result<BTreeMap<String, String>> {
    let mut state = State::OutsideTable;
    let mut series_id = String::new();
    let mut out = BTreeMap::new();

    for token in tokenize(html) {
        match token {
            Token::Text(text) => match state {
                State::InTableRow if is_series_id(&text) => {
                    series_id = text;
                    transition(&mut state, State::FoundSeries);
                }
                // A series without an ETF class: start over on the next one.
                State::FoundSeries if is_series_id(&text) => series_id = text,
                State::FoundSeries if text == ETF_CLASS_NAME => {
                    transition(&mut state, State::FoundEtf);
                }
                State::InEtfNameCell => {
                    if text.starts_with("C000") || text.starts_with("S000") {
                        bail!("about to record id {text} as the ETF name of {series_id} (cik={cik:010})");
                    }
                    out.insert(series_id.clone(), text);
                    transition(&mut state, State::WaitingForNextSeries);
                }
                _ => {}
            },
            Token::Start(name) => match (name.as_str(), state) {
                ("tr", State::OutsideTable) => transition(&mut state, State::InTableRow),
                ("td", State::FoundEtf) => transition(&mut state, State::InEtfNameCell),
                _ => {}
            },
            Token::End(name) => match (name.as_str(), state) {
                ("table", _) => transition(&mut state, State::OutsideTable),
                // FoundEtf: the row ended without a ticker cell.
                ("tr", State::WaitingForNextSeries | State::FoundEtf) => {
                    transition(&mut state, State::InTableRow)
                }
                // Empty ticker cell.
                ("td", State::InEtfNameCell) => {
                    transition(&mut state, State::WaitingForNextSeries)
                }
                _ => {}
            },
        }
    }
    Ok(out)
}

pub fn series_page_url(archive_base: &str, cik: u64) -> String {
    format!(
        "{}/cgi-bin/browse-edgar?scd=series&CIK={:010}&action=getcompany",
        archive_base.trim_end_matches('/'),
        cik
    )
}

pub async fn fetch_series_page(
    client: &mut FetchClient,
    archive_base: &str,
    cik: u64,
) -> Result<String, FetchError> {
    let url = series_page_url(archive_base, cik);
    tracing::info!(cik, %url, "fetching series page");
    client.execute(&url).await
}
