// src/filings/types.rs
use serde::{Deserialize, Serialize};

/// One pending fetch: a single N-PORT-P filing of a registrant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDescriptor {
    pub cik: u64,
    pub accession_number: String, // without dashes
    pub filing_date: String,      // YYYY-MM-DD
}

/// Holdings snapshot of one fund series as of one filing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Index {
    pub name: String,
    pub series_id: String,
    pub filing_date: String,
    // Weights may add up to more than 100%.
    pub components: Vec<IndexComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexComponent {
    pub name: String,
    pub id: String,
    pub id_type: String,
    pub weight: f32,
}
