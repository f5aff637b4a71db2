// src/table.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::{entity::Entity, indicator::Indicator};

pub type Year = i32;

/// A single time series: year → value.
pub type Series = BTreeMap<Year, f64>;

/// `indicator → entity → year → value`.
///
/// Only finite values are ever stored; a missing observation is a missing key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationTable {
    data: BTreeMap<Indicator, BTreeMap<Entity, Series>>,
}

impl ObservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any earlier one. Returns the replaced value.
    /// Non-finite values are refused and leave the table untouched.
    pub fn insert(
        &mut self,
        indicator: Indicator,
        entity: Entity,
        year: Year,
        value: f64,
    ) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        self.data
            .entry(indicator)
            .or_default()
            .entry(entity)
            .or_default()
            .insert(year, value)
    }

    pub fn get(&self, indicator: Indicator, entity: Entity, year: Year) -> Option<f64> {
        self.data
            .get(&indicator)
            .and_then(|m| m.get(&entity))
            .and_then(|s| s.get(&year))
            .copied()
    }

    pub fn series(&self, indicator: Indicator, entity: Entity) -> Option<&Series> {
        self.data.get(&indicator).and_then(|m| m.get(&entity))
    }

    pub(crate) fn series_mut(&mut self, indicator: Indicator, entity: Entity) -> Option<&mut Series> {
        self.data.get_mut(&indicator).and_then(|m| m.get_mut(&entity))
    }

    /// Every `(entity, series)` stored for `indicator`, in entity order.
    pub fn iter_indicator(&self, indicator: Indicator) -> impl Iterator<Item = (Entity, &Series)> {
        self.data
            .get(&indicator)
            .into_iter()
            .flat_map(|m| m.iter().map(|(e, s)| (*e, s)))
    }

    /// Every stored value of `indicator`, across entities and years.
    pub fn values(&self, indicator: Indicator) -> impl Iterator<Item = f64> + '_ {
        self.iter_indicator(indicator)
            .flat_map(|(_, s)| s.values().copied())
    }

    /// Number of entities with at least one value for `indicator`.
    pub fn entity_count(&self, indicator: Indicator) -> usize {
        self.iter_indicator(indicator)
            .filter(|(_, s)| !s.is_empty())
            .count()
    }

    /// Number of `(entity, year)` observations for `indicator`.
    pub fn len(&self, indicator: Indicator) -> usize {
        self.iter_indicator(indicator).map(|(_, s)| s.len()).sum()
    }

    pub fn total_len(&self) -> usize {
        Indicator::ALL.iter().map(|i| self.len(*i)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Years observed for `indicator` by any entity.
    pub fn years_of(&self, indicator: Indicator) -> BTreeSet<Year> {
        self.iter_indicator(indicator)
            .flat_map(|(_, s)| s.keys().copied())
            .collect()
    }

    /// Union of years across all three indicators.
    pub fn years(&self) -> BTreeSet<Year> {
        Indicator::ALL
            .iter()
            .flat_map(|i| self.years_of(*i))
            .collect()
    }

    /// Years observed for every indicator, newest first.
    pub fn common_years(&self) -> Vec<Year> {
        let mut sets = Indicator::ALL.iter().map(|i| self.years_of(*i));
        let first = sets.next().unwrap_or_default();
        let common = sets.fold(first, |acc, s| acc.intersection(&s).copied().collect());
        common.into_iter().rev().collect()
    }
}
