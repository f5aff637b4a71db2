//! Year-over-year anomaly detection and the bounded correction pass.
//!
//! Each `(indicator, entity)` series is scanned on its own, oldest year
//! first. A jump above the indicator threshold is *flagged*; it is
//! *confirmed* when the following change is also above threshold, when it is
//! more than twice the threshold, or when it is the known base-year shift.
//! Only confirmed anomalies touching the policy's correction year can be
//! rewritten; the rest are reported and logged.

pub mod correct;
pub mod policy;

use serde::Serialize;
use tracing::{info, instrument, warn};

pub use correct::{correct, Correction};
pub use policy::{
    AnomalyPolicy, Bounds, CorrectionRule, FactorChoice, RejectReason, Thresholds, Transition,
    Verdict,
};

use crate::{
    entity::Entity,
    indicator::Indicator,
    table::{ObservationTable, Series, Year},
};

/// Relative change in percent, against the larger of the two values.
pub fn change_pct(a: f64, b: f64) -> f64 {
    let denom = a.max(b);
    if denom == 0.0 {
        return 0.0;
    }
    (b - a).abs() / denom * 100.0
}

/// A confirmed year-over-year jump.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Anomaly {
    pub indicator: Indicator,
    pub entity: Entity,
    pub from_year: Year,
    pub to_year: Year,
    pub from_value: f64,
    pub to_value: f64,
    pub change_pct: f64,
    pub next_change_pct: Option<f64>,
    pub base_year_shift: bool,
}

impl Anomaly {
    fn touches(&self, year: Year) -> bool {
        self.from_year == year || self.to_year == year
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScanReport {
    /// Jumps over the flag trigger, confirmed or not.
    pub flagged: usize,
    pub confirmed: Vec<Anomaly>,
}

fn scan_series(
    indicator: Indicator,
    entity: Entity,
    series: &Series,
    policy: &AnomalyPolicy,
    report: &mut ScanReport,
) {
    let threshold = policy.threshold(indicator);
    let points: Vec<(Year, f64)> = series.iter().map(|(y, v)| (*y, *v)).collect();

    for (i, pair) in points.windows(2).enumerate() {
        let (from_year, from_value) = pair[0];
        let (to_year, to_value) = pair[1];
        let pct = change_pct(from_value, to_value);
        let shift = policy.is_base_year_shift(from_year, to_year);

        if !(pct > threshold || (shift && pct > threshold * 0.5)) {
            continue;
        }
        report.flagged += 1;

        let next_pct = points.get(i + 2).map(|&(_, next)| change_pct(to_value, next));
        let spike = next_pct.is_some_and(|p| p > threshold);
        if spike || pct > threshold * 2.0 || shift {
            report.confirmed.push(Anomaly {
                indicator,
                entity,
                from_year,
                to_year,
                from_value,
                to_value,
                change_pct: pct,
                next_change_pct: next_pct,
                base_year_shift: shift,
            });
        }
    }
}

/// Detection only; the table is not touched.
pub fn scan(table: &ObservationTable, policy: &AnomalyPolicy) -> ScanReport {
    let mut report = ScanReport::default();
    for indicator in Indicator::ALL {
        for (entity, series) in table.iter_indicator(indicator) {
            scan_series(indicator, entity, series, policy, &mut report);
        }
    }
    report
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub scan: ScanReport,
    pub corrections: Vec<Correction>,
    /// Confirmed anomalies away from the correction year: reported, never fixed.
    pub flagged_only: Vec<Anomaly>,
}

impl AnomalyReport {
    pub fn changed_table(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Scan, then run the correction pass if anything was confirmed.
#[instrument(level = "info", skip_all, fields(values = table.total_len()))]
pub fn run(table: &mut ObservationTable, policy: &AnomalyPolicy) -> AnomalyReport {
    let scan = scan(table, policy);

    let flagged_only: Vec<Anomaly> = scan
        .confirmed
        .iter()
        .filter(|a| !a.touches(policy.correction_year))
        .cloned()
        .collect();
    for a in &flagged_only {
        warn!(
            indicator = %a.indicator,
            entity = %a.entity,
            from_year = a.from_year,
            to_year = a.to_year,
            change_pct = a.change_pct,
            "anomaly outside the correction year; left as is"
        );
    }

    let corrections = if scan.confirmed.is_empty() {
        Vec::new()
    } else {
        correct(table, policy, true)
    };

    info!(
        flagged = scan.flagged,
        confirmed = scan.confirmed.len(),
        corrected = corrections.len(),
        flagged_only = flagged_only.len(),
        "anomaly pass done"
    );
    AnomalyReport {
        scan,
        corrections,
        flagged_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_series(t: &mut ObservationTable, ind: Indicator, e: Entity, pts: &[(Year, f64)]) {
        for &(y, v) in pts {
            t.insert(ind, e, y, v);
        }
    }

    #[test]
    fn change_is_relative_to_larger_value() {
        assert_eq!(change_pct(100.0, 200.0), 50.0);
        assert_eq!(change_pct(200.0, 100.0), 50.0);
        assert_eq!(change_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn single_moderate_jump_is_flagged_not_confirmed() {
        let mut t = ObservationTable::new();
        // 30% jump, below twice the 25% Output threshold, then flat.
        insert_series(
            &mut t,
            Indicator::Output,
            Entity::PL,
            &[(2014, 10_000.0), (2015, 14_300.0), (2016, 14_400.0)],
        );
        let r = scan(&t, &AnomalyPolicy::default());
        assert_eq!(r.flagged, 1);
        assert!(r.confirmed.is_empty());
    }

    #[test]
    fn spike_confirmed_by_following_change() {
        let mut t = ObservationTable::new();
        insert_series(
            &mut t,
            Indicator::Output,
            Entity::FR,
            &[(2014, 30_000.0), (2015, 45_000.0), (2016, 30_500.0)],
        );
        let r = scan(&t, &AnomalyPolicy::default());
        assert_eq!(r.flagged, 2);
        assert_eq!(r.confirmed.len(), 1);
        let a = &r.confirmed[0];
        assert_eq!((a.from_year, a.to_year), (2014, 2015));
        assert!(a.next_change_pct.unwrap() > 25.0);
    }

    #[test]
    fn base_year_shift_flags_at_half_threshold() {
        let mut t = ObservationTable::new();
        // 6% population change: under 10% but over half of it.
        insert_series(
            &mut t,
            Indicator::Population,
            Entity::SE,
            &[(2009, 9_400_000.0), (2010, 10_000_000.0), (2011, 10_050_000.0)],
        );
        let r = scan(&t, &AnomalyPolicy::default());
        assert_eq!(r.confirmed.len(), 1);
        assert!(r.confirmed[0].base_year_shift);
    }

    #[test]
    fn population_error_is_corrected_and_rescan_is_clean() {
        crate::init_test_logging();
        let mut t = ObservationTable::new();
        insert_series(
            &mut t,
            Indicator::Population,
            Entity::DE,
            &[
                (2008, 82_000_000.0),
                (2009, 81_900_000.0),
                (2010, 818_000_000.0),
                (2011, 80_300_000.0),
                (2012, 80_500_000.0),
            ],
        );
        let policy = AnomalyPolicy::default();
        let report = run(&mut t, &policy);

        assert!(report.changed_table());
        assert!(report.flagged_only.is_empty());
        assert_eq!(t.get(Indicator::Population, Entity::DE, 2010), Some(81_800_000.0));
        assert!(scan(&t, &policy).confirmed.is_empty());
    }

    #[test]
    fn anomalies_elsewhere_are_flagged_only() {
        crate::init_test_logging();
        let mut t = ObservationTable::new();
        insert_series(
            &mut t,
            Indicator::Output,
            Entity::FR,
            &[(2014, 30_000.0), (2015, 300_000.0), (2016, 30_500.0)],
        );
        let before = t.clone();
        let report = run(&mut t, &AnomalyPolicy::default());

        assert_eq!(report.flagged_only.len(), 2);
        assert!(report.corrections.is_empty());
        assert_eq!(t, before);
    }

    #[test]
    fn calm_series_is_idempotent() {
        let mut t = ObservationTable::new();
        for e in [Entity::BE, Entity::NL, Entity::LU] {
            insert_series(
                &mut t,
                Indicator::LifeExpectancy,
                e,
                &[(2009, 80.1), (2010, 80.4), (2011, 80.7), (2012, 80.6)],
            );
        }
        let policy = AnomalyPolicy::default();
        let first = run(&mut t, &policy);
        let after_first = t.clone();
        run(&mut t, &policy);

        assert!(first.scan.confirmed.is_empty());
        assert_eq!(t, after_first);
    }
}
