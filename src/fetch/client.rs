// src/fetch/client.rs
//! HTTP client for the EDGAR archive.
//!
//! Every request passes two gates before it is sent:
//! - `pacing`: one request per short period (the published 10 req/s rule);
//! - `volume`: a long rolling window bounding the total number of requests.
//!
//! The volume window models a suspected token bucket over roughly ten
//! minutes. Exceeding it gets the IP banned, so the defaults below are
//! conservative guesses rather than documented limits.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;

use super::clock::{Clock, TokioClock};
use super::error::{ConfigError, FetchError};
use super::gate::Gate;

/// Slightly under 10 requests per second, padded against clock jitter.
pub const DEFAULT_PACING_PERIOD: Duration = Duration::from_millis(105);
pub const MAX_RPS: u32 = 10;
pub const DEFAULT_VOLUME_CAPACITY: usize = 80;
pub const DEFAULT_VOLUME_PERIOD: Duration = Duration::from_secs(12 * 60);

/// Map a requests-per-second budget to the pacing gate period.
pub fn pacing_period_for_rps(rps: u32) -> Result<Duration, ConfigError> {
    match rps {
        0 | 11.. => Err(ConfigError::RpsOutOfRange(rps)),
        MAX_RPS => Ok(DEFAULT_PACING_PERIOD),
        _ => Ok(Duration::from_millis(1000) / rps),
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Identification sent as `User-Agent` (name + contact email, per SEC rules).
    pub user_agent: String,
    pub rps: u32,
    pub volume_capacity: usize,
    pub volume_period: Duration,
}

impl ClientSettings {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            rps: MAX_RPS,
            volume_capacity: DEFAULT_VOLUME_CAPACITY,
            volume_period: DEFAULT_VOLUME_PERIOD,
        }
    }

    pub fn with_rps(mut self, rps: u32) -> Self {
        self.rps = rps;
        self
    }

    pub fn with_volume(mut self, capacity: usize, period: Duration) -> Self {
        self.volume_capacity = capacity;
        self.volume_period = period;
        self
    }
}

pub struct FetchClient {
    http: reqwest::Client,
    user_agent: String,
    pacing: Gate,
    volume: Gate,
}

impl FetchClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ConfigError> {
        Self::with_clock(Arc::new(TokioClock::new()), settings)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, settings: ClientSettings) -> Result<Self, ConfigError> {
        super::ensure_metrics_described();

        let pacing_period = pacing_period_for_rps(settings.rps)?;
        let pacing = Gate::new("pacing", clock.clone(), pacing_period, 1)?;
        let volume = Gate::new(
            "volume",
            clock,
            settings.volume_period,
            settings.volume_capacity,
        )?;

        // gzip/deflate features make reqwest send Accept-Encoding and decode bodies.
        let http = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            user_agent: settings.user_agent,
            pacing,
            volume,
        })
    }

    /// GET `url` and return the body. The request counts against both gates
    /// even when it fails.
    pub async fn execute(&mut self, url: &str) -> Result<String, FetchError> {
        if self.volume.try_advance().await {
            // The volume wait is far longer than the pacing period.
            self.pacing.reset();
        }
        self.pacing.try_advance().await;

        counter!("edgar_requests_total").increment(1);
        tracing::debug!(url, remaining = self.volume.remaining(), "GET");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|source| {
                counter!("edgar_request_errors_total").increment(1);
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            counter!("edgar_request_errors_total").increment(1);
            return Err(FetchError::BadStatus {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(|source| {
            counter!("edgar_request_errors_total").increment(1);
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        })
    }

    pub async fn decode_json<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, FetchError> {
        let body = self.execute(url).await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Json {
            url: url.to_string(),
            source,
        })
    }

    pub async fn decode_xml<T: DeserializeOwned>(&mut self, url: &str) -> Result<T, FetchError> {
        let body = self.execute(url).await?;
        quick_xml::de::from_str(&body).map_err(|source| FetchError::Xml {
            url: url.to_string(),
            source,
        })
    }

    /// Drain the volume window on purpose and start a fresh one.
    pub async fn force_sleep(&mut self) {
        self.volume.force_wait().await;
        self.pacing.reset();
    }

    pub fn remaining_before_sleep(&self) -> usize {
        self.volume.remaining()
    }
}
