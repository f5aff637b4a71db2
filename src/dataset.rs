// src/dataset.rs

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, instrument, warn};

use crate::{
    anomaly::{self, AnomalyPolicy, AnomalyReport},
    config::Config,
    decode::{normalize_all, IndicatorDecodeSummary},
    entity::Entity,
    error::LoadError,
    fetch::RemoteResponses,
    indicator::Indicator,
    local::{normalize_records, LocalRecord, LocalReport},
    scale::{derive_scales, Scales},
    table::{ObservationTable, Year},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Remote,
    Local,
}

/// What happened during one load.
#[derive(Clone, Debug, Serialize)]
pub struct LoadReport {
    pub source: Source,
    pub decode: BTreeMap<Indicator, IndicatorDecodeSummary>,
    pub local: Option<LocalReport>,
    pub anomalies: AnomalyReport,
    pub values: BTreeMap<Indicator, usize>,
}

/// One complete, read-only load: the corrected table and everything derived
/// from it.
#[derive(Clone, Debug)]
pub struct Dataset {
    table: ObservationTable,
    years: BTreeSet<Year>,
    common_years: Vec<Year>,
    scales: Scales,
    report: LoadReport,
}

impl Dataset {
    /// Correct anomalies in `table`, then derive years and scales from the
    /// corrected values.
    pub fn build(
        mut table: ObservationTable,
        source: Source,
        decode: BTreeMap<Indicator, IndicatorDecodeSummary>,
        local: Option<LocalReport>,
        policy: &AnomalyPolicy,
    ) -> Self {
        let anomalies = anomaly::run(&mut table, policy);
        let values = Indicator::ALL.iter().map(|&i| (i, table.len(i))).collect();
        Self {
            years: table.years(),
            common_years: table.common_years(),
            scales: derive_scales(&table),
            report: LoadReport {
                source,
                decode,
                local,
                anomalies,
                values,
            },
            table,
        }
    }

    pub fn get_value(&self, entity: Entity, year: Year, indicator: Indicator) -> Option<f64> {
        self.table.get(indicator, entity, year)
    }

    pub fn table(&self) -> &ObservationTable {
        &self.table
    }

    /// Every year with a value for any indicator, ascending.
    pub fn years(&self) -> &BTreeSet<Year> {
        &self.years
    }

    /// Years with data for all three indicators, newest first.
    pub fn common_years(&self) -> &[Year] {
        &self.common_years
    }

    pub fn latest_common_year(&self) -> Option<Year> {
        self.common_years.first().copied()
    }

    pub fn scales(&self) -> &Scales {
        &self.scales
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn source(&self) -> Source {
        self.report.source
    }

    /// Mean of `indicator` over the entities that have a value for `year`.
    pub fn average(&self, indicator: Indicator, year: Year) -> Option<f64> {
        let (sum, n) = self
            .table
            .iter_indicator(indicator)
            .filter_map(|(_, s)| s.get(&year))
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    pub fn averages(&self, year: Year) -> BTreeMap<Indicator, f64> {
        Indicator::ALL
            .iter()
            .filter_map(|&i| self.average(i, year).map(|avg| (i, avg)))
            .collect()
    }
}

fn decode_remote(
    remote: &RemoteResponses,
    table: &mut ObservationTable,
) -> BTreeMap<Indicator, IndicatorDecodeSummary> {
    Indicator::ALL
        .iter()
        .map(|&ind| (ind, normalize_all(remote.get(ind), ind, table)))
        .collect()
}

/// Owns the current dataset. A reload builds a complete new dataset and
/// swaps it in; a failed reload leaves the previous one in place.
#[derive(Debug)]
pub struct Session {
    config: Config,
    current: Option<Dataset>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Dataset> {
        self.current.as_ref()
    }

    /// Load from `remote` when it covers enough entities and years, otherwise
    /// from the records `local` yields. The two are never merged.
    #[instrument(level = "info", skip_all, fields(remote_payloads = remote.map_or(0, RemoteResponses::payload_count)))]
    pub fn reload<F>(
        &mut self,
        remote: Option<&RemoteResponses>,
        local: F,
    ) -> Result<&Dataset, LoadError>
    where
        F: FnOnce() -> Result<Vec<LocalRecord>>,
    {
        let dataset = self.build(remote, local)?;
        info!(
            source = ?dataset.source(),
            years = dataset.years().len(),
            common_years = dataset.common_years().len(),
            corrections = dataset.report().anomalies.corrections.len(),
            "dataset loaded"
        );
        Ok(self.current.insert(dataset))
    }

    fn build<F>(&self, remote: Option<&RemoteResponses>, local: F) -> Result<Dataset, LoadError>
    where
        F: FnOnce() -> Result<Vec<LocalRecord>>,
    {
        let policy = &self.config.anomaly;

        if let Some(remote) = remote {
            let mut table = ObservationTable::new();
            let decode = decode_remote(remote, &mut table);
            if self.config.sufficiency.is_met(&table) {
                return Ok(Dataset::build(table, Source::Remote, decode, None, policy));
            }
            warn!(
                values = table.total_len(),
                output = table.entity_count(Indicator::Output),
                life_expectancy = table.entity_count(Indicator::LifeExpectancy),
                population = table.entity_count(Indicator::Population),
                years = table.years().len(),
                "remote data insufficient; using local file"
            );
        }

        let records = match local() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "local data file unusable");
                return Err(LoadError::NoData);
            }
        };
        let mut table = ObservationTable::new();
        let report = normalize_records(&records, &mut table);
        if table.is_empty() {
            return Err(LoadError::NoData);
        }
        Ok(Dataset::build(
            table,
            Source::Local,
            BTreeMap::new(),
            Some(report),
            policy,
        ))
    }
}
