// src/decode/normalize.rs

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::codec::{Axis, AxisRoles, IndexCodec};
use super::payload::{IdList, StatPayload};
use crate::{
    entity::Entity,
    indicator::Indicator,
    table::{ObservationTable, Year},
};

/// Which of the three encodings a response was decoded with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One explicit position tuple per value.
    Tuples,
    /// Flat value array addressed through row-major strides.
    Strided,
    /// Two dimensions, entity-major, no usable `id`.
    Legacy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ApiError,
    MissingDimension,
    MissingValue,
}

/// Outcome of decoding one response. Values are either accepted or counted
/// under exactly one drop reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub layout: Option<Layout>,
    pub skipped: Option<SkipReason>,
    pub accepted: usize,
    pub unit_mismatch: usize,
    pub unresolved: usize,
    pub missing_value: usize,
}

impl DecodeReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn dropped(&self) -> usize {
        self.unit_mismatch + self.unresolved + self.missing_value
    }
}

enum Rejected {
    Unresolved,
    MissingValue,
}

/// Year from the first four characters of a time label (`"2015"`, `"2015-01"`).
pub fn parse_year(label: &str) -> Option<Year> {
    let head: String = label.trim().chars().take(4).collect();
    head.parse().ok()
}

fn resolve(
    entity_label: Option<&str>,
    time_label: Option<&str>,
    value: Option<f64>,
) -> Result<(Entity, Year, f64), Rejected> {
    let entity = entity_label
        .and_then(Entity::from_code)
        .ok_or(Rejected::Unresolved)?;
    let year = time_label.and_then(parse_year).ok_or(Rejected::Unresolved)?;
    let value = value
        .filter(|v| v.is_finite())
        .ok_or(Rejected::MissingValue)?;
    Ok((entity, year, value))
}

/// Decode one indicator response into `table`.
///
/// Never fails: malformed payloads are skipped and unresolvable values are
/// dropped one by one, all of it reflected in the returned report.
pub fn normalize_response(
    payload: &StatPayload,
    indicator: Indicator,
    table: &mut ObservationTable,
) -> DecodeReport {
    if let Some(err) = &payload.error {
        warn!(indicator = %indicator, error = %err, "response carries an API error; skipping");
        return DecodeReport::skipped(SkipReason::ApiError);
    }
    let Some(dimension) = &payload.dimension else {
        warn!(indicator = %indicator, "response has no dimension block; skipping");
        return DecodeReport::skipped(SkipReason::MissingDimension);
    };
    let Some(values) = &payload.value else {
        warn!(indicator = %indicator, "response has no value block; skipping");
        return DecodeReport::skipped(SkipReason::MissingValue);
    };

    // Declared dimension order: the `id` name list if there is one, otherwise
    // the order of the `dimension` object.
    let names: Vec<String> = match &payload.id {
        Some(IdList::Names(names)) => names.clone(),
        _ => dimension.keys().cloned().collect(),
    };
    let axes: Vec<Axis> = names
        .iter()
        .map(|name| {
            let pairs = dimension
                .get(name)
                .and_then(|d| d.category.as_ref())
                .and_then(|c| c.index.as_ref())
                .map(|i| i.pairs())
                .unwrap_or_default();
            Axis::new(name.as_str(), &pairs)
        })
        .collect();

    let target_unit = |roles: &AxisRoles| -> Option<usize> {
        let unit_name = names.get(roles.unit?)?;
        let index = dimension.get(unit_name)?.category.as_ref()?.index.as_ref()?;
        indicator
            .preferred_units()
            .iter()
            .find_map(|code| index.position_of(code))
    };

    let sizes = payload.size.as_deref().unwrap_or(&[]);
    let mut report = DecodeReport::default();
    let mut record = |report: &mut DecodeReport, outcome: Result<(Entity, Year, f64), Rejected>| {
        match outcome {
            Ok((entity, year, value)) => {
                table.insert(indicator, entity, year, value);
                report.accepted += 1;
            }
            Err(Rejected::Unresolved) => report.unresolved += 1,
            Err(Rejected::MissingValue) => report.missing_value += 1,
        }
    };

    match &payload.id {
        Some(IdList::Tuples(tuples)) if tuples.first().is_some_and(|t| t.len() > 1) => {
            report.layout = Some(Layout::Tuples);
            let Some(roles) = AxisRoles::resolve(&names, tuples[0].len()) else {
                return report;
            };
            let unit = target_unit(&roles);
            for (i, tuple) in tuples.iter().enumerate() {
                if tuple.len() <= roles.entity.max(roles.time) {
                    trace!(i, "tuple shorter than declared dimensions");
                    report.unresolved += 1;
                    continue;
                }
                if let (Some(target), Some(axis)) = (unit, roles.unit) {
                    if tuple.get(axis).is_some_and(|&u| u != target) {
                        report.unit_mismatch += 1;
                        continue;
                    }
                }
                let entity = axes.get(roles.entity).and_then(|a| a.label(tuple[roles.entity]));
                let time = axes.get(roles.time).and_then(|a| a.label(tuple[roles.time]));
                record(&mut report, resolve(entity, time, values.get(i)));
            }
        }
        Some(_) if sizes.len() > 1 => {
            report.layout = Some(Layout::Strided);
            let Some(roles) = AxisRoles::resolve(&names, sizes.len()) else {
                return report;
            };
            let unit = target_unit(&roles);
            let codec = IndexCodec::new(axes, Some(sizes));
            for (flat, value) in values.entries() {
                let positions = codec.positions(flat);
                if let (Some(target), Some(axis)) = (unit, roles.unit) {
                    if positions.get(axis).is_some_and(|&u| u != target) {
                        report.unit_mismatch += 1;
                        continue;
                    }
                }
                let entity = codec.label(flat, roles.entity);
                let time = codec.label(flat, roles.time);
                record(&mut report, resolve(entity, time, value));
            }
        }
        _ => {
            report.layout = Some(Layout::Legacy);
            let Some(roles) = AxisRoles::resolve(&names, names.len()) else {
                return report;
            };
            let (Some(entity_axis), Some(time_axis)) = (axes.get(roles.entity), axes.get(roles.time))
            else {
                return report;
            };
            let entity_size = sizes
                .first()
                .copied()
                .unwrap_or(entity_axis.labels.len())
                .max(1);
            let time_size = sizes
                .get(1)
                .copied()
                .unwrap_or(time_axis.labels.len())
                .max(1);
            for (i, value) in values.entries() {
                let entity = entity_axis.label((i / time_size) % entity_size);
                let time = time_axis.label(i % time_size);
                record(&mut report, resolve(entity, time, value));
            }
        }
    }

    debug!(
        indicator = %indicator,
        layout = ?report.layout,
        accepted = report.accepted,
        unit_mismatch = report.unit_mismatch,
        unresolved = report.unresolved,
        missing_value = report.missing_value,
        "decoded response"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::payload::StatPayload;

    fn decode(json: &str, indicator: Indicator) -> (ObservationTable, DecodeReport) {
        let payload = StatPayload::from_json(json).unwrap();
        let mut table = ObservationTable::new();
        let report = normalize_response(&payload, indicator, &mut table);
        (table, report)
    }

    #[test]
    fn tuples_with_one_unit_mismatch_keep_five_of_six() {
        let (table, report) = decode(
            r#"{
                "size": [2, 3],
                "dimension": {
                    "unit": {"category": {"index": {"CLV10_EUR_HAB": 0, "CP_EUR_HAB": 1}}},
                    "geo": {"category": {"index": {"BE": 0, "DK": 1}}},
                    "time": {"category": {"index": {"2019": 0, "2020": 1, "2021": 2}}}
                },
                "id": [[0,0,0],[0,0,1],[0,0,2],[0,1,0],[1,1,1],[0,1,2]],
                "value": [30000, 30500, 31000, 50000, 51000, 52000]
            }"#,
            Indicator::Output,
        );

        assert_eq!(report.layout, Some(Layout::Tuples));
        assert_eq!(report.accepted, 5);
        assert_eq!(report.unit_mismatch, 1);
        assert_eq!(table.len(Indicator::Output), 2 * 3 - 1);
        assert_eq!(table.get(Indicator::Output, Entity::DK, 2020), None);
        assert_eq!(table.get(Indicator::Output, Entity::DK, 2021), Some(52000.0));
    }

    #[test]
    fn strided_layout_filters_by_second_probe_unit() {
        // unit × geo × time = 2 × 2 × 2, CLV10 absent so CLV20 is the target.
        let (table, report) = decode(
            r#"{
                "id": ["unit", "geo", "time"],
                "size": [2, 2, 2],
                "dimension": {
                    "geo": {"category": {"index": {"FR": 0, "IT": 1}}},
                    "time": {"category": {"index": {"2010": 0, "2011": 1}}},
                    "unit": {"category": {"index": {"PC_GDP": 0, "CLV20_EUR_HAB": 1}}}
                },
                "value": [1, 2, 3, 4, 30000, 30100, 27000, 27100]
            }"#,
            Indicator::Output,
        );

        assert_eq!(report.layout, Some(Layout::Strided));
        assert_eq!(report.accepted, 4);
        assert_eq!(report.unit_mismatch, 4);
        assert_eq!(table.get(Indicator::Output, Entity::FR, 2011), Some(30100.0));
        assert_eq!(table.get(Indicator::Output, Entity::IT, 2010), Some(27000.0));
    }

    #[test]
    fn strided_layout_with_sparse_values() {
        let (table, report) = decode(
            r#"{
                "id": ["freq", "geo", "time"],
                "size": [1, 2, 3],
                "dimension": {
                    "freq": {"category": {"index": {"A": 0}}},
                    "geo": {"category": {"index": {"EU27_2020": 0, "SE": 1}}},
                    "time": {"category": {"index": {"2018": 0, "2019": 1, "2020": 2}}}
                },
                "value": {"0": 80.1, "4": 83.0, "5": 82.4}
            }"#,
            Indicator::LifeExpectancy,
        );

        assert_eq!(report.accepted, 2);
        assert_eq!(report.unresolved, 1);
        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::SE, 2019), Some(83.0));
        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::SE, 2020), Some(82.4));
        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::SE, 2018), None);
    }

    #[test]
    fn legacy_two_dimension_layout() {
        let (table, report) = decode(
            r#"{
                "size": [2, 2],
                "dimension": {
                    "geo": {"category": {"index": {"PL": 0, "PT": 1}}},
                    "time": {"category": {"index": {"2020-01-01": 0, "2021-01-01": 1}}}
                },
                "value": [37900000, null, 10300000, 10290000]
            }"#,
            Indicator::Population,
        );

        assert_eq!(report.layout, Some(Layout::Legacy));
        assert_eq!(report.accepted, 3);
        assert_eq!(report.missing_value, 1);
        assert_eq!(table.get(Indicator::Population, Entity::PL, 2020), Some(37_900_000.0));
        assert_eq!(table.get(Indicator::Population, Entity::PT, 2021), Some(10_290_000.0));
    }

    #[test]
    fn unnamed_dimensions_use_last_two_positions() {
        let (table, report) = decode(
            r#"{
                "id": ["sex", "country", "period"],
                "size": [1, 1, 2],
                "dimension": {
                    "sex": {"category": {"index": {"T": 0}}},
                    "country": {"category": {"index": {"LU": 0}}},
                    "period": {"category": {"index": {"2016": 0, "2017": 1}}}
                },
                "value": [82.0, 82.3]
            }"#,
            Indicator::LifeExpectancy,
        );

        assert_eq!(report.accepted, 2);
        assert_eq!(table.get(Indicator::LifeExpectancy, Entity::LU, 2017), Some(82.3));
    }

    #[test]
    fn malformed_responses_are_skipped() {
        let (table, report) = decode(r#"{"value": [1, 2]}"#, Indicator::Output);
        assert_eq!(report.skipped, Some(SkipReason::MissingDimension));
        assert!(table.is_empty());

        let (_, report) = decode(r#"{"dimension": {}}"#, Indicator::Output);
        assert_eq!(report.skipped, Some(SkipReason::MissingValue));

        let (_, report) = decode(
            r#"{"error": {"label": "bad"}, "dimension": {}, "value": []}"#,
            Indicator::Output,
        );
        assert_eq!(report.skipped, Some(SkipReason::ApiError));
    }

    #[test]
    fn empty_unit_axis_after_geo_and_time_decodes_nothing() {
        // Output response without a usable unit: size 0 zeroes every stride before it.
        let (table, report) = decode(
            r#"{
                "id": ["geo", "time", "unit"],
                "size": [2, 3, 0],
                "dimension": {
                    "geo": {"category": {"index": {"FR": 0, "IT": 1}}},
                    "time": {"category": {"index": {"2019": 0, "2020": 1, "2021": 2}}},
                    "unit": {"category": {"index": {}}}
                },
                "value": {"0": 30000}
            }"#,
            Indicator::Output,
        );

        assert_eq!(report.layout, Some(Layout::Strided));
        assert_eq!(report.accepted, 0);
        assert_eq!(report.unresolved, 1);
        assert!(table.is_empty());
    }

    #[test]
    fn every_accepted_value_resolves_to_declared_labels() {
        let (table, _) = decode(
            r#"{
                "id": ["geo", "time"],
                "size": [3, 2],
                "dimension": {
                    "geo": {"category": {"index": {"AT": 0, "XX": 1, "CY": 2}}},
                    "time": {"category": {"index": {"2012": 0, "n/a": 1}}}
                },
                "value": [1, 2, 3, 4, 5, 6]
            }"#,
            Indicator::Population,
        );

        let entities: Vec<_> = table
            .iter_indicator(Indicator::Population)
            .map(|(e, s)| (e, s.keys().copied().collect::<Vec<_>>()))
            .collect();
        assert_eq!(entities, vec![(Entity::CY, vec![2012]), (Entity::AT, vec![2012])]);
    }

    #[test]
    fn parse_year_reads_first_four_chars() {
        assert_eq!(parse_year("2015"), Some(2015));
        assert_eq!(parse_year("2015-01-01"), Some(2015));
        assert_eq!(parse_year("2015Q3"), Some(2015));
        assert_eq!(parse_year("n/a"), None);
    }
}
