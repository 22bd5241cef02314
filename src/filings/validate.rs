// src/filings/validate.rs
//! Business-rule checks on a decoded [`Index`] before it is stored.

use crate::filings::types::Index;

const KNOWN_ID_TYPES: &[&str] = &["isin", "ticker", "sedol", "faid", "cins", "cusip", "vid"];

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// ETF the series maps to; `None` if the series is unknown.
    pub etf_name: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }

    fn warning(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    pub fn log(&self) {
        if self.is_clean() {
            return;
        }
        let etf = self.etf_name.as_deref().unwrap_or("<unknown>");
        for e in &self.errors {
            tracing::error!(etf, "validation: {e}");
        }
        for w in &self.warnings {
            tracing::warn!(etf, "validation: {w}");
        }
    }
}

fn missing(s: &str) -> bool {
    s.is_empty() || s == "N/A"
}

/// `etf_name` is the catalog entry for `(cik, index.series_id)`, if any.
pub fn validate_index(index: &Index, etf_name: Option<&str>) -> ValidationReport {
    let mut res = ValidationReport::default();

    if missing(&index.name) {
        res.error("index is missing its name".to_string());
    }
    if index.series_id.is_empty() {
        res.error(format!("index {} is missing its series id", index.name));
    }
    match etf_name {
        None => res.warning(format!(
            "index {} (series {}) has no corresponding ETF in the catalog",
            index.name, index.series_id
        )),
        Some("") => res.error(format!("empty ETF name in the catalog for index {}", index.name)),
        Some(name) => res.etf_name = Some(name.to_string()),
    }

    // Not worth looking at components once the index itself is off.
    if !res.is_clean() {
        return res;
    }
    let etf = res.etf_name.clone().unwrap_or_default();

    for c in &index.components {
        if missing(&c.name) {
            res.error(format!("ETF {etf} has a component with no name (id={})", c.id));
        }
        if missing(&c.id) {
            res.error(format!("ETF {etf} has a component with no id (name={})", c.name));
        }
        if missing(&c.id_type) {
            res.error(format!(
                "ETF {etf} has a component with no id type (name={}, id={})",
                c.name, c.id
            ));
        } else if !KNOWN_ID_TYPES.contains(&c.id_type.as_str()) {
            res.warning(format!(
                "ETF {etf} has a component with an unknown id type (name={}, id={}, id_type={})",
                c.name, c.id, c.id_type
            ));
        }
        if c.weight < 0.0 {
            res.error(format!(
                "ETF {etf} has a component with negative weight (name={}, id={})",
                c.name, c.id
            ));
        }
    }
    res
}
