// src/filings/holdings.rs
//! N-PORT-P primary document (`primary_doc.xml`) → [`Index`].
//!
//! Only the subset of the N-PORT XML schema needed for holdings is mapped;
//! everything else in the document is ignored by serde.

use serde::Deserialize;

use crate::fetch::{FetchClient, FetchError};
use crate::filings::types::{FetchDescriptor, Index, IndexComponent};

const VANGUARD_CONTRACT_DESC: &str = "CONTRACT_VANGUARD_ID";

#[derive(Debug, Deserialize)]
#[serde(rename = "edgarSubmission")]
pub struct EdgarSubmission {
    #[serde(rename = "formData")]
    pub form_data: FormData,
}

#[derive(Debug, Deserialize)]
pub struct FormData {
    #[serde(rename = "genInfo")]
    pub gen_info: GenInfo,
    #[serde(rename = "invstOrSecs", default)]
    pub invst_or_secs: InvstOrSecs,
}

#[derive(Debug, Deserialize)]
pub struct GenInfo {
    #[serde(rename = "seriesName", default)]
    pub series_name: String,
    #[serde(rename = "seriesId", default)]
    pub series_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvstOrSecs {
    #[serde(rename = "invstOrSec", default)]
    pub items: Vec<InvstOrSec>,
}

#[derive(Debug, Deserialize)]
pub struct InvstOrSec {
    #[serde(default)]
    pub name: String,
    // Reported down to 1e-12; f32 keeps enough precision for a weight.
    #[serde(rename = "pctVal", default)]
    pub pct_val: f32,
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(rename = "derivativeInfo", default)]
    pub derivative_info: Option<DerivativeInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Identifiers {
    #[serde(default)]
    pub isin: Option<ValueAttr>,
    #[serde(default)]
    pub ticker: Option<ValueAttr>,
    // A holding may carry several `<other>` ids (SEDOL, VID, ...).
    #[serde(default)]
    pub other: Vec<OtherId>,
}

#[derive(Debug, Deserialize)]
pub struct ValueAttr {
    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct OtherId {
    #[serde(rename = "@otherDesc", default)]
    pub other_desc: String,
    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DerivativeInfo {
    #[serde(rename = "fwdDeriv", default)]
    pub fwd: Option<DerivCat>,
    #[serde(rename = "futrDeriv", default)]
    pub futr: Option<DerivCat>,
    #[serde(rename = "swapDeriv", default)]
    pub swap: Option<DerivCat>,
    #[serde(rename = "optionSwaptionWarrantDeriv", default)]
    pub option_swaption_warrant: Option<DerivCat>,
    #[serde(rename = "othDeriv", default)]
    pub other: Option<DerivCat>,
}

#[derive(Debug, Deserialize)]
pub struct DerivCat {
    #[serde(rename = "@derivCat", default)]
    pub deriv_cat: String,
}

impl DerivativeInfo {
    fn is_derivative(&self) -> bool {
        [
            &self.fwd,
            &self.futr,
            &self.swap,
            &self.option_swaption_warrant,
            &self.other,
        ]
        .into_iter()
        .flatten()
        .any(|c| !c.deriv_cat.is_empty())
    }
}

impl InvstOrSec {
    fn is_derivative(&self) -> bool {
        let by_info = self
            .derivative_info
            .as_ref()
            .is_some_and(DerivativeInfo::is_derivative);
        // Vanguard contract ids only show up on derivatives; checked on its own as well.
        let by_id = self
            .identifiers
            .other
            .iter()
            .any(|o| o.other_desc == VANGUARD_CONTRACT_DESC);
        by_info || by_id
    }

    /// `(id, id_type)` by precedence ISIN → ticker → other. Empty when absent.
    fn identifier(&self) -> (String, String) {
        let ids = &self.identifiers;
        if let Some(isin) = ids.isin.as_ref().filter(|v| !v.value.is_empty()) {
            return (isin.value.clone(), "isin".to_string());
        }
        if let Some(ticker) = ids.ticker.as_ref().filter(|v| !v.value.is_empty()) {
            return (ticker.value.clone(), "ticker".to_string());
        }
        match ids.other.iter().find(|o| !o.value.is_empty()) {
            Some(o) => (o.value.clone(), o.other_desc.to_ascii_lowercase()),
            None => (String::new(), String::new()),
        }
    }
}

pub fn primary_doc_url(archive_base: &str, cik: u64, accession: &str) -> String {
    format!(
        "{}/Archives/edgar/data/{}/{}/primary_doc.xml",
        archive_base.trim_end_matches('/'),
        cik,
        accession
    )
}

/// Build the snapshot: derivatives dropped, components sorted by weight
/// descending then id ascending.
pub fn to_index(submission: EdgarSubmission, filing_date: &str) -> Index {
    let form = submission.form_data;
    let mut components: Vec<IndexComponent> = form
        .invst_or_secs
        .items
        .into_iter()
        .filter(|sec| !sec.is_derivative())
        .map(|sec| {
            let (id, id_type) = sec.identifier();
            IndexComponent {
                name: sec.name,
                id,
                id_type,
                weight: sec.pct_val,
            }
        })
        .collect();

    components.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.id.cmp(&b.id))
    });

    Index {
        name: form.gen_info.series_name,
        series_id: form.gen_info.series_id,
        filing_date: filing_date.to_string(),
        components,
    }
}

pub fn parse_index(xml: &str, filing_date: &str) -> Result<Index, quick_xml::de::DeError> {
    let submission: EdgarSubmission = quick_xml::de::from_str(xml)?;
    Ok(to_index(submission, filing_date))
}

pub async fn fetch_index(
    client: &mut FetchClient,
    archive_base: &str,
    descriptor: &FetchDescriptor,
) -> Result<Index, FetchError> {
    let url = primary_doc_url(archive_base, descriptor.cik, &descriptor.accession_number);
    tracing::info!(%url, filing_date = %descriptor.filing_date, "fetching holdings document");
    let submission: EdgarSubmission = client.decode_xml(&url).await?;
    let index = to_index(submission, &descriptor.filing_date);
    tracing::info!(
        name = %index.name,
        series_id = %index.series_id,
        components = index.components.len(),
        "fetched holdings"
    );
    Ok(index)
}
