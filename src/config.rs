// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{anomaly::AnomalyPolicy, indicator::Indicator, table::ObservationTable};

pub const ENV_BASE_URL: &str = "EUROSTAT_BASE_URL";
pub const ENV_LOCAL_DATA: &str = "EUSTAT_LOCAL_DATA";
pub const ENV_YEARS_BACK: &str = "EUSTAT_YEARS_BACK";

pub const DEFAULT_BASE_URL: &str =
    "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data";

/// Minimum coverage for remote data to be used instead of the local file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sufficiency {
    /// Entities with at least one value, required for every indicator.
    pub min_entities: usize,
    /// Distinct years across the whole table.
    pub min_years: usize,
}

impl Default for Sufficiency {
    fn default() -> Self {
        Self {
            min_entities: 10,
            min_years: 5,
        }
    }
}

impl Sufficiency {
    pub fn is_met(&self, table: &ObservationTable) -> bool {
        let entities_ok = Indicator::ALL
            .iter()
            .all(|&ind| table.entity_count(ind) >= self.min_entities);
        entities_ok && table.years().len() >= self.min_years
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub local_data_path: PathBuf,
    /// Calendar years requested, the current one included.
    pub years_back: u32,
    /// Longer request URLs are split into entity batches.
    pub max_url_len: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub sufficiency: Sufficiency,
    pub anomaly: AnomalyPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            local_data_path: PathBuf::from("media/eurostat.json"),
            years_back: 16,
            max_url_len: 2000,
            batch_size: 10,
            max_concurrency: 3,
            max_retries: 3,
            backoff_ms: 500,
            sufficiency: Sufficiency::default(),
            anomaly: AnomalyPolicy::default(),
        }
    }
}

impl Config {
    /// Defaults, then the YAML file if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        info!(
            base_url = %config.base_url,
            local = %config.local_data_path.display(),
            years_back = config.years_back,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config: Self =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {:?}", path))?;
        Ok(config.sanitized())
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            debug!(%url, "base url from environment");
            self.base_url = url;
        }
        if let Some(path) = lookup(ENV_LOCAL_DATA) {
            self.local_data_path = PathBuf::from(path);
        }
        if let Some(years) = lookup(ENV_YEARS_BACK) {
            self.years_back = years
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number, got {:?}", ENV_YEARS_BACK, years))?;
        }
        *self = std::mem::take(self).sanitized();
        Ok(())
    }

    fn sanitized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.years_back = self.years_back.max(1);
        self.batch_size = self.batch_size.max(1);
        self.max_concurrency = self.max_concurrency.max(1);
        self
    }
}
