// src/anomaly/correct.rs

use serde::Serialize;
use std::ops::Bound::{Excluded, Unbounded};
use tracing::{debug, info};

use super::{
    change_pct,
    policy::{AnomalyPolicy, FactorChoice, Neighbors, RejectReason, Verdict},
};
use crate::{
    entity::Entity,
    indicator::Indicator,
    table::{ObservationTable, Series, Year},
};

/// A value rewritten by the correction pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Correction {
    pub indicator: Indicator,
    pub entity: Entity,
    pub year: Year,
    pub original: f64,
    pub corrected: f64,
    pub factor: f64,
}

/// Look at the correction year of one series and return
/// `(original, factor, corrected)` for an accepted rescale. `Ok(None)` means
/// the series does not qualify for review at all.
fn review(
    series: &Series,
    indicator: Indicator,
    policy: &AnomalyPolicy,
    confirmed: bool,
) -> Result<Option<(f64, f64, f64)>, RejectReason> {
    let year = policy.correction_year;
    let Some(&observed) = series.get(&year) else {
        return Ok(None);
    };
    let Some((_, &next)) = series.range((Excluded(year), Unbounded)).next() else {
        return Ok(None);
    };
    if change_pct(observed, next) <= policy.threshold(indicator) {
        return Ok(None);
    }
    let prev = series.range(..year).next_back().map(|(_, v)| *v);
    let reference = policy.reference(indicator, observed, Neighbors { prev, next })?;

    let mut best: Option<(f64, f64)> = None;
    let mut last_reject = RejectReason::NoImprovement;
    for &factor in &policy.factors {
        match policy.decide(indicator, confirmed, factor, observed, reference) {
            Verdict::Accept(candidate) if policy.factor_choice == FactorChoice::FirstAccepted => {
                best = Some((factor, candidate));
                break;
            }
            Verdict::Accept(candidate) => {
                let closer = best.map_or(true, |(_, b)| {
                    (candidate - reference).abs() < (b - reference).abs()
                });
                if closer {
                    best = Some((factor, candidate));
                }
            }
            Verdict::Reject(reason) => last_reject = reason,
        }
    }
    best.map(|(factor, candidate)| Some((observed, factor, candidate)))
        .ok_or(last_reject)
}

/// Rescale implausible values at the policy's correction year in place.
///
/// `confirmed` is whether the preceding scan confirmed any anomaly; without
/// one nothing is rewritten.
pub fn correct(
    table: &mut ObservationTable,
    policy: &AnomalyPolicy,
    confirmed: bool,
) -> Vec<Correction> {
    let year = policy.correction_year;
    let mut corrections = Vec::new();

    for indicator in Indicator::ALL {
        for (entity, series) in table.iter_indicator(indicator) {
            match review(series, indicator, policy, confirmed) {
                Ok(Some((original, factor, corrected))) => corrections.push(Correction {
                    indicator,
                    entity,
                    year,
                    original,
                    corrected,
                    factor,
                }),
                Ok(None) => {}
                Err(reason) => {
                    debug!(indicator = %indicator, entity = %entity, year, ?reason, "value left unchanged")
                }
            }
        }
    }

    for c in &corrections {
        if let Some(series) = table.series_mut(c.indicator, c.entity) {
            series.insert(c.year, c.corrected);
        }
        info!(
            indicator = %c.indicator,
            entity = %c.entity,
            year = c.year,
            original = c.original,
            corrected = c.corrected,
            factor = c.factor,
            "corrected unit-scale anomaly"
        );
    }
    corrections
}
