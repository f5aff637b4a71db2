// src/entity.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the EU member states tracked by the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Entity {
    BE,
    BG,
    CZ,
    DK,
    DE,
    EE,
    IE,
    EL,
    ES,
    FR,
    HR,
    IT,
    CY,
    LV,
    LT,
    LU,
    HU,
    MT,
    NL,
    AT,
    PL,
    PT,
    RO,
    SI,
    SK,
    FI,
    SE,
}

impl Entity {
    pub const ALL: [Entity; 27] = [
        Entity::BE,
        Entity::BG,
        Entity::CZ,
        Entity::DK,
        Entity::DE,
        Entity::EE,
        Entity::IE,
        Entity::EL,
        Entity::ES,
        Entity::FR,
        Entity::HR,
        Entity::IT,
        Entity::CY,
        Entity::LV,
        Entity::LT,
        Entity::LU,
        Entity::HU,
        Entity::MT,
        Entity::NL,
        Entity::AT,
        Entity::PL,
        Entity::PT,
        Entity::RO,
        Entity::SI,
        Entity::SK,
        Entity::FI,
        Entity::SE,
    ];

    /// Eurostat `geo` code.
    pub fn code(&self) -> &'static str {
        match self {
            Entity::BE => "BE",
            Entity::BG => "BG",
            Entity::CZ => "CZ",
            Entity::DK => "DK",
            Entity::DE => "DE",
            Entity::EE => "EE",
            Entity::IE => "IE",
            Entity::EL => "EL",
            Entity::ES => "ES",
            Entity::FR => "FR",
            Entity::HR => "HR",
            Entity::IT => "IT",
            Entity::CY => "CY",
            Entity::LV => "LV",
            Entity::LT => "LT",
            Entity::LU => "LU",
            Entity::HU => "HU",
            Entity::MT => "MT",
            Entity::NL => "NL",
            Entity::AT => "AT",
            Entity::PL => "PL",
            Entity::PT => "PT",
            Entity::RO => "RO",
            Entity::SI => "SI",
            Entity::SK => "SK",
            Entity::FI => "FI",
            Entity::SE => "SE",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Entity::BE => "Belgium",
            Entity::BG => "Bulgaria",
            Entity::CZ => "Czechia",
            Entity::DK => "Denmark",
            Entity::DE => "Germany",
            Entity::EE => "Estonia",
            Entity::IE => "Ireland",
            Entity::EL => "Greece",
            Entity::ES => "Spain",
            Entity::FR => "France",
            Entity::HR => "Croatia",
            Entity::IT => "Italy",
            Entity::CY => "Cyprus",
            Entity::LV => "Latvia",
            Entity::LT => "Lithuania",
            Entity::LU => "Luxembourg",
            Entity::HU => "Hungary",
            Entity::MT => "Malta",
            Entity::NL => "Netherlands",
            Entity::AT => "Austria",
            Entity::PL => "Poland",
            Entity::PT => "Portugal",
            Entity::RO => "Romania",
            Entity::SI => "Slovenia",
            Entity::SK => "Slovakia",
            Entity::FI => "Finland",
            Entity::SE => "Sweden",
        }
    }

    /// Exact, case-sensitive match on the `geo` code. Aggregates such as
    /// `EU27_2020` are not entities and resolve to `None`.
    pub fn from_code(s: &str) -> Option<Self> {
        Entity::ALL.iter().copied().find(|e| e.code() == s)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}
