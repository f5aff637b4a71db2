// src/anomaly/policy.rs

use serde::{Deserialize, Serialize};

use crate::{indicator::Indicator, table::Year};

/// Year-over-year change (percent) above which a jump is flagged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub output: f64,
    pub life_expectancy: f64,
    pub population: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            output: 25.0,
            life_expectancy: 15.0,
            population: 10.0,
        }
    }
}

impl Thresholds {
    pub fn get(&self, indicator: Indicator) -> f64 {
        match indicator {
            Indicator::Output => self.output,
            Indicator::LifeExpectancy => self.life_expectancy,
            Indicator::Population => self.population,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Year,
    pub to: Year,
}

/// Open interval `(min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, v: f64) -> bool {
        v > self.min && v < self.max
    }
}

/// Which accepted divisor the corrector keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorChoice {
    /// The accepted candidate nearest the reference, whatever its position.
    #[default]
    Closest,
    /// The first accepted candidate in `factors` order.
    FirstAccepted,
}

/// Everything the detector and the corrector treat as tunable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyPolicy {
    pub thresholds: Thresholds,
    /// A known base-year change: flagged at half the threshold, always confirmed.
    pub base_year_shift: Transition,
    /// The only year whose value the corrector may rewrite.
    pub correction_year: Year,
    /// Candidate divisors. Every one is judged; `factor_choice` picks among
    /// the accepted.
    pub factors: Vec<f64>,
    pub factor_choice: FactorChoice,
    /// A candidate must cut the distance to its reference by at least this share.
    pub min_improvement: f64,
    /// No member state has more inhabitants than this.
    pub population_ceiling: f64,
    pub output_bounds: Bounds,
    /// Output is only reconsidered when it sits further than this share from
    /// its neighbours' mean.
    pub neighbor_deviation: f64,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            base_year_shift: Transition {
                from: 2009,
                to: 2010,
            },
            correction_year: 2010,
            factors: vec![10.0, 100.0],
            factor_choice: FactorChoice::Closest,
            min_improvement: 0.5,
            population_ceiling: 85_000_000.0,
            output_bounds: Bounds {
                min: 5_000.0,
                max: 120_000.0,
            },
            neighbor_deviation: 0.5,
        }
    }
}

/// How a candidate value is judged for one indicator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CorrectionRule {
    /// Never rewritten.
    Disabled,
    /// Reconsidered only above `ceiling`; judged against the next year.
    Ceiling { ceiling: f64, bounds: Bounds },
    /// Reconsidered when far from the neighbours' mean; judged against that mean.
    NeighborMean { deviation: f64, bounds: Bounds },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotConfirmed,
    NoRule,
    NotTriggered,
    NoImprovement,
    OutOfRange,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    Accept(f64),
    Reject(RejectReason),
}

/// Neighbouring observations around the value under review.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbors {
    pub prev: Option<f64>,
    pub next: f64,
}

impl AnomalyPolicy {
    pub fn threshold(&self, indicator: Indicator) -> f64 {
        self.thresholds.get(indicator)
    }

    pub fn rule(&self, indicator: Indicator) -> CorrectionRule {
        match indicator {
            Indicator::Population => CorrectionRule::Ceiling {
                ceiling: self.population_ceiling,
                bounds: Bounds {
                    min: 0.0,
                    max: self.population_ceiling,
                },
            },
            Indicator::Output => CorrectionRule::NeighborMean {
                deviation: self.neighbor_deviation,
                bounds: self.output_bounds,
            },
            Indicator::LifeExpectancy => CorrectionRule::Disabled,
        }
    }

    /// The value a candidate is compared against, or why `observed` is not
    /// reconsidered at all.
    pub fn reference(
        &self,
        indicator: Indicator,
        observed: f64,
        neighbors: Neighbors,
    ) -> Result<f64, RejectReason> {
        match self.rule(indicator) {
            CorrectionRule::Disabled => Err(RejectReason::NoRule),
            CorrectionRule::Ceiling { ceiling, .. } => {
                if observed > ceiling {
                    Ok(neighbors.next)
                } else {
                    Err(RejectReason::NotTriggered)
                }
            }
            CorrectionRule::NeighborMean { deviation, .. } => {
                let prev = neighbors.prev.ok_or(RejectReason::NotTriggered)?;
                let mean = (prev + neighbors.next) / 2.0;
                if (observed - mean).abs() > mean * deviation {
                    Ok(mean)
                } else {
                    Err(RejectReason::NotTriggered)
                }
            }
        }
    }

    /// The decision table: `(indicator, confirmed, factor)` → accept or reject.
    pub fn decide(
        &self,
        indicator: Indicator,
        confirmed: bool,
        factor: f64,
        observed: f64,
        reference: f64,
    ) -> Verdict {
        if !confirmed {
            return Verdict::Reject(RejectReason::NotConfirmed);
        }
        let bounds = match self.rule(indicator) {
            CorrectionRule::Disabled => return Verdict::Reject(RejectReason::NoRule),
            CorrectionRule::Ceiling { bounds, .. } | CorrectionRule::NeighborMean { bounds, .. } => {
                bounds
            }
        };
        if factor <= 0.0 || !factor.is_finite() {
            return Verdict::Reject(RejectReason::NoImprovement);
        }

        let candidate = observed / factor;
        let before = (observed - reference).abs();
        let after = (candidate - reference).abs();
        if after >= before * (1.0 - self.min_improvement) {
            return Verdict::Reject(RejectReason::NoImprovement);
        }
        if !bounds.contains(candidate) {
            return Verdict::Reject(RejectReason::OutOfRange);
        }
        Verdict::Accept(candidate)
    }

    pub fn is_base_year_shift(&self, from: Year, to: Year) -> bool {
        self.base_year_shift.from == from && self.base_year_shift.to == to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_rescale_accepted_when_in_range_and_closer() {
        let p = AnomalyPolicy::default();
        let v = p.decide(Indicator::Population, true, 10.0, 818_000_000.0, 80_300_000.0);
        assert_eq!(v, Verdict::Accept(81_800_000.0));
    }

    #[test]
    fn unconfirmed_never_accepted() {
        let p = AnomalyPolicy::default();
        let v = p.decide(Indicator::Population, false, 10.0, 818_000_000.0, 80_300_000.0);
        assert_eq!(v, Verdict::Reject(RejectReason::NotConfirmed));
    }

    #[test]
    fn life_expectancy_has_no_rule() {
        let p = AnomalyPolicy::default();
        let v = p.decide(Indicator::LifeExpectancy, true, 10.0, 800.0, 80.0);
        assert_eq!(v, Verdict::Reject(RejectReason::NoRule));
    }

    #[test]
    fn output_candidate_outside_bounds_rejected() {
        let p = AnomalyPolicy::default();
        // ÷100 lands at 2 500, closer to 3 000 but below the 5 000 floor.
        let v = p.decide(Indicator::Output, true, 100.0, 250_000.0, 3_000.0);
        assert_eq!(v, Verdict::Reject(RejectReason::OutOfRange));
    }

    #[test]
    fn insufficient_improvement_rejected() {
        let p = AnomalyPolicy::default();
        // 90M → 9M is further from 60M than half the original gap.
        let v = p.decide(Indicator::Population, true, 10.0, 90_000_000.0, 60_000_000.0);
        assert_eq!(v, Verdict::Reject(RejectReason::NoImprovement));
    }

    #[test]
    fn reference_per_rule() {
        let p = AnomalyPolicy::default();
        let n = Neighbors {
            prev: Some(25_000.0),
            next: 26_000.0,
        };
        assert_eq!(p.reference(Indicator::Output, 250_000.0, n), Ok(25_500.0));
        assert_eq!(
            p.reference(Indicator::Output, 30_000.0, n),
            Err(RejectReason::NotTriggered)
        );
        assert_eq!(
            p.reference(
                Indicator::Output,
                250_000.0,
                Neighbors {
                    prev: None,
                    next: 26_000.0
                }
            ),
            Err(RejectReason::NotTriggered)
        );
        assert_eq!(
            p.reference(Indicator::Population, 84_000_000.0, n),
            Err(RejectReason::NotTriggered)
        );
    }

    #[test]
    fn factor_choice_reads_snake_case() {
        let p: AnomalyPolicy = serde_yaml::from_str("factor_choice: first_accepted\n").unwrap();
        assert_eq!(p.factor_choice, FactorChoice::FirstAccepted);
    }

    #[test]
    fn policy_reads_partial_yaml() {
        let p: AnomalyPolicy = serde_yaml::from_str(
            "thresholds:\n  population: 5.0\ncorrection_year: 2015\nfactors: [1000.0]\n",
        )
        .unwrap();
        assert_eq!(p.threshold(Indicator::Population), 5.0);
        assert_eq!(p.threshold(Indicator::Output), 25.0);
        assert_eq!(p.correction_year, 2015);
        assert_eq!(p.factors, vec![1000.0]);
        assert_eq!(p.factor_choice, FactorChoice::Closest);
        assert_eq!(p.population_ceiling, 85_000_000.0);
    }
}
