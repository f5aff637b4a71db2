// src/scale.rs

use serde::Serialize;

use crate::{indicator::Indicator, table::ObservationTable};

/// Share of the observed range added on each side.
const PADDING: f64 = 0.05;

/// Fixed display range for one indicator. Both ends are absent when the
/// indicator has no data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScaleRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScaleRange {
    /// Padded range over `values`; the lower end never drops below zero.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut bounds: Option<(f64, f64)> = None;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            bounds = Some(match bounds {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        match bounds {
            None => Self::default(),
            Some((lo, hi)) => {
                let pad = (hi - lo) * PADDING;
                Self {
                    min: Some((lo - pad).max(0.0)),
                    max: Some(hi + pad),
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Ranges for the continuously scaled indicators, fixed across all years so
/// comparisons between years stay visually stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Scales {
    pub output: ScaleRange,
    pub life_expectancy: ScaleRange,
}

impl Scales {
    pub fn get(&self, indicator: Indicator) -> Option<&ScaleRange> {
        match indicator {
            Indicator::Output => Some(&self.output),
            Indicator::LifeExpectancy => Some(&self.life_expectancy),
            Indicator::Population => None,
        }
    }
}

pub fn derive_scales(table: &ObservationTable) -> Scales {
    Scales {
        output: ScaleRange::from_values(table.values(Indicator::Output)),
        life_expectancy: ScaleRange::from_values(table.values(Indicator::LifeExpectancy)),
    }
}
