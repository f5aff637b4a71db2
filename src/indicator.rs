// src/indicator.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three series the dataset carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// Real GDP per capita (chain-linked euro per inhabitant).
    Output,
    /// Life expectancy at age 1, both sexes.
    LifeExpectancy,
    /// Population on 1 January, both sexes, all ages.
    Population,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [
        Indicator::Output,
        Indicator::LifeExpectancy,
        Indicator::Population,
    ];

    /// Indicators that get a fixed display scale.
    pub const SCALED: [Indicator; 2] = [Indicator::Output, Indicator::LifeExpectancy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Output => "output",
            Indicator::LifeExpectancy => "life_expectancy",
            Indicator::Population => "population",
        }
    }

    /// Tag used by the local fallback file.
    pub fn local_tag(&self) -> &'static str {
        match self {
            Indicator::Output => "PIB",
            Indicator::LifeExpectancy => "SV",
            Indicator::Population => "POP",
        }
    }

    pub fn from_local_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "PIB" => Some(Indicator::Output),
            "SV" => Some(Indicator::LifeExpectancy),
            "POP" => Some(Indicator::Population),
            _ => None,
        }
    }

    /// Unit codes to look for in a `unit` dimension, in probe order.
    /// Only Output is filtered by unit.
    pub fn preferred_units(&self) -> &'static [&'static str] {
        match self {
            Indicator::Output => &["CLV10_EUR_HAB", "CLV20_EUR_HAB"],
            Indicator::LifeExpectancy | Indicator::Population => &[],
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
