// src/local.rs

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{debug, info, instrument, warn};

use crate::{
    entity::Entity,
    indicator::Indicator,
    table::{ObservationTable, Year},
};

/// One row of the local fallback file. Field names follow the file as it is
/// published (`tara`, `an`, `valoare`); the English names are accepted too.
/// Every field is kept loose so a single bad row cannot fail the whole file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LocalRecord {
    #[serde(default)]
    pub indicator: Option<Value>,
    #[serde(default, alias = "tara")]
    pub entity: Option<Value>,
    #[serde(default, alias = "an")]
    pub year: Option<Value>,
    #[serde(default, alias = "valoare")]
    pub value: Option<Value>,
}

/// The one known unit-scale defect of the local file: Danish population
/// published in a different unit, undercounted by a constant factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnownCorrection {
    pub indicator: Indicator,
    pub entity: Entity,
    /// Applies to raw values strictly below this.
    pub below: f64,
    pub factor: f64,
}

pub const DANISH_POPULATION: KnownCorrection = KnownCorrection {
    indicator: Indicator::Population,
    entity: Entity::DK,
    below: 1_000_000.0,
    factor: 6.7,
};

impl KnownCorrection {
    fn apply(&self, indicator: Indicator, entity: Entity, value: f64) -> f64 {
        if indicator == self.indicator && entity == self.entity && value < self.below {
            value * self.factor
        } else {
            value
        }
    }
}

/// Same key written twice with values far apart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conflict {
    pub indicator: Indicator,
    pub entity: Entity,
    pub year: Year,
    pub previous: f64,
    pub current: f64,
    pub diff_pct: f64,
}

/// Relative difference at or above which a rewrite is reported.
pub const CONFLICT_PCT: f64 = 50.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LocalReport {
    pub accepted: usize,
    pub skipped: usize,
    pub corrected: usize,
    pub conflicts: Vec<Conflict>,
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_of(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn year_of(v: &Value) -> Option<Year> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|y| Year::try_from(y).ok()),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Resolve a record to a table key and value, before any correction.
fn parse_record(rec: &LocalRecord) -> Option<(Indicator, Entity, Year, f64)> {
    let indicator = Indicator::from_local_tag(&text_of(rec.indicator.as_ref()?)?)?;
    let entity = Entity::from_code(&text_of(rec.entity.as_ref()?)?)?;
    let year = year_of(rec.year.as_ref()?)?;
    let value = number_of(rec.value.as_ref()?)?;
    Some((indicator, entity, year, value))
}

/// Fold `records` into `table`. Later records overwrite earlier ones for the
/// same key; large rewrites are logged and reported.
pub fn normalize_records(records: &[LocalRecord], table: &mut ObservationTable) -> LocalReport {
    let mut report = LocalReport::default();

    for (i, rec) in records.iter().enumerate() {
        let Some((indicator, entity, year, raw)) = parse_record(rec) else {
            debug!(row = i, record = ?rec, "skipping unusable local record");
            report.skipped += 1;
            continue;
        };

        let value = DANISH_POPULATION.apply(indicator, entity, raw);
        if value != raw {
            debug!(entity = %entity, year, raw, value, "applied known unit correction");
            report.corrected += 1;
        }

        if let Some(previous) = table.insert(indicator, entity, year, value) {
            let diff_pct = (value - previous).abs() / previous.max(value) * 100.0;
            if diff_pct >= CONFLICT_PCT {
                warn!(
                    indicator = %indicator,
                    entity = %entity,
                    year,
                    previous,
                    current = value,
                    diff_pct,
                    "conflicting duplicate in local data; keeping the later value"
                );
                report.conflicts.push(Conflict {
                    indicator,
                    entity,
                    year,
                    previous,
                    current: value,
                    diff_pct,
                });
            }
        }
        report.accepted += 1;
    }

    report
}

/// Read the local fallback file: a JSON array of records.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<LocalRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))?;
    let Value::Array(items) = value else {
        return Err(anyhow!("{:?}: expected a JSON array of records", path));
    };

    let records: Vec<LocalRecord> = items
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect();
    info!(records = records.len(), "read local records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn records(v: Value) -> Vec<LocalRecord> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn danish_population_below_threshold_is_scaled() {
        let mut table = ObservationTable::new();
        let report = normalize_records(
            &records(json!([{"indicator": "POP", "tara": "DK", "an": 2015, "valoare": 500000}])),
            &mut table,
        );

        assert_eq!(report.accepted, 1);
        assert_eq!(report.corrected, 1);
        let v = table.get(Indicator::Population, Entity::DK, 2015).unwrap();
        assert!((v - 3_350_000.0).abs() < 1e-6);
    }

    #[test]
    fn danish_population_above_threshold_and_other_entities_untouched() {
        let mut table = ObservationTable::new();
        let report = normalize_records(
            &records(json!([
                {"indicator": "POP", "tara": "DK", "an": 2016, "valoare": 5700000},
                {"indicator": "POP", "tara": "SE", "an": 2016, "valoare": 900000},
                {"indicator": "PIB", "tara": "DK", "an": 2016, "valoare": 50000}
            ])),
            &mut table,
        );

        assert_eq!(report.corrected, 0);
        assert_eq!(table.get(Indicator::Population, Entity::DK, 2016), Some(5_700_000.0));
        assert_eq!(table.get(Indicator::Population, Entity::SE, 2016), Some(900_000.0));
        assert_eq!(table.get(Indicator::Output, Entity::DK, 2016), Some(50_000.0));
    }

    #[test]
    fn later_record_wins_and_conflict_is_reported() {
        crate::init_test_logging();
        let mut table = ObservationTable::new();
        let report = normalize_records(
            &records(json!([
                {"indicator": "SV", "tara": "FI", "an": 2018, "valoare": 100},
                {"indicator": "SV", "tara": "FI", "an": 2018, "valoare": 200}
            ])),
            &mut table,
        );

        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::FI, 2018), Some(200.0));
        assert_eq!(report.conflicts.len(), 1);
        let c = &report.conflicts[0];
        assert_eq!((c.previous, c.current), (100.0, 200.0));
        assert!((c.diff_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn small_rewrites_are_not_conflicts() {
        let mut table = ObservationTable::new();
        let report = normalize_records(
            &records(json!([
                {"indicator": "SV", "tara": "FI", "an": 2018, "valoare": 81.5},
                {"indicator": "SV", "tara": "FI", "an": 2018, "valoare": 81.7}
            ])),
            &mut table,
        );
        assert!(report.conflicts.is_empty());
        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::FI, 2018), Some(81.7));
    }

    #[test]
    fn unusable_records_are_skipped() {
        let mut table = ObservationTable::new();
        let report = normalize_records(
            &records(json!([
                {"indicator": "GDP", "tara": "FR", "an": 2018, "valoare": 1},
                {"indicator": "PIB", "tara": "UK", "an": 2018, "valoare": 1},
                {"indicator": "PIB", "tara": "FR", "an": "n/a", "valoare": 1},
                {"indicator": "PIB", "tara": "FR", "an": 2018, "valoare": "abc"},
                {"indicator": "PIB", "tara": "FR", "an": 2018},
                {"indicator": "PIB", "entity": "FR", "year": "2019", "value": "36000.5"}
            ])),
            &mut table,
        );

        assert_eq!(report.skipped, 5);
        assert_eq!(report.accepted, 1);
        assert_eq!(table.get(Indicator::Output, Entity::FR, 2019), Some(36_000.5));
    }

    #[test]
    fn read_records_requires_an_array() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"[{{"indicator":"POP","tara":"AT","an":2020,"valoare":8900000}}, 42]"#)?;
        let recs = read_records(file.path())?;
        assert_eq!(recs.len(), 2);

        let mut bad = NamedTempFile::new()?;
        write!(bad, r#"{{"indicator":"POP"}}"#)?;
        assert!(read_records(bad.path()).is_err());
        Ok(())
    }
}
