// src/fetch/error.rs
use reqwest::StatusCode;

/// Per-request failures. None of them roll back gate state.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("non-2xx answer {status} for {url}")]
    BadStatus { url: String, status: StatusCode },

    #[error("failed to decode JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode XML from {url}: {source}")]
    Xml {
        url: String,
        #[source]
        source: quick_xml::de::DeError,
    },
}

impl FetchError {
    /// True for decode failures, as opposed to transport or status failures.
    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Json { .. } | FetchError::Xml { .. })
    }
}

/// Invalid construction parameters; fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("requests per second must be in [1, 10], got {0}")]
    RpsOutOfRange(u32),

    #[error("gate `{0}` needs a capacity of at least 1")]
    ZeroCapacity(&'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
