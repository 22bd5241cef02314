// src/config/settings.rs
//! Runtime settings: environment first, then an optional TOML file, then defaults.
//!
//! ```toml
//! # config/fetch.toml
//! volume_capacity = 80
//! volume_period_secs = 720
//! data_dir = "./data"
//! catalog_path = "./all_etfs.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::fetch::client::{
    pacing_period_for_rps, ClientSettings, DEFAULT_VOLUME_CAPACITY, DEFAULT_VOLUME_PERIOD,
};

pub const ENV_USER_AGENT: &str = "USER_AGENT";
pub const ENV_RPS: &str = "EDGAR_RPS";
pub const ENV_SETTINGS_PATH: &str = "FETCH_SETTINGS_PATH";
pub const DEFAULT_SETTINGS_PATH: &str = "config/fetch.toml";

pub const DEFAULT_RPS: u32 = 5;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_CATALOG_PATH: &str = "./all_etfs.json";
pub const DEFAULT_DATA_BASE: &str = "https://data.sec.gov";
pub const DEFAULT_ARCHIVE_BASE: &str = "https://www.sec.gov";

/// Optional overrides read from the TOML settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub rps: Option<u32>,
    pub volume_capacity: Option<usize>,
    pub volume_period_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub data_base: Option<String>,
    pub archive_base: Option<String>,
}

impl FileSettings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing settings {}", path.display()))
    }

    /// 1) `$FETCH_SETTINGS_PATH` (must exist)
    /// 2) `config/fetch.toml` if present
    /// 3) nothing
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SETTINGS_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_SETTINGS_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_SETTINGS_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub user_agent: String,
    pub rps: u32,
    pub volume_capacity: usize,
    pub volume_period: Duration,
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub data_base: String,
    pub archive_base: String,
}

impl AppSettings {
    pub fn from_env() -> Result<Self> {
        let file = FileSettings::load_default()?;
        Self::resolve(|key| std::env::var(key).ok(), file)
    }

    /// Merge `lookup` (environment) over `file` over defaults and validate.
    pub fn resolve<F>(lookup: F, file: FileSettings) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user_agent = lookup(ENV_USER_AGENT)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("{ENV_USER_AGENT} must be set (name and contact email)"))?;

        let rps = match lookup(ENV_RPS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{ENV_RPS}={raw:?} is not a number"))?,
            None => file.rps.unwrap_or(DEFAULT_RPS),
        };
        pacing_period_for_rps(rps)?;

        let volume_capacity = file.volume_capacity.unwrap_or(DEFAULT_VOLUME_CAPACITY);
        if volume_capacity == 0 {
            bail!("volume_capacity must be at least 1");
        }
        let volume_period = file
            .volume_period_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_VOLUME_PERIOD);

        Ok(Self {
            user_agent,
            rps,
            volume_capacity,
            volume_period,
            data_dir: file.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            catalog_path: file
                .catalog_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            data_base: file.data_base.unwrap_or_else(|| DEFAULT_DATA_BASE.to_string()),
            archive_base: file
                .archive_base
                .unwrap_or_else(|| DEFAULT_ARCHIVE_BASE.to_string()),
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings::new(self.user_agent.clone())
            .with_rps(self.rps)
            .with_volume(self.volume_capacity, self.volume_period)
    }
}
