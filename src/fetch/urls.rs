// src/fetch/urls.rs

use anyhow::{Context, Result};
use url::Url;

use crate::{entity::Entity, indicator::Indicator, table::Year};

/// A Eurostat dataset code plus the fixed dimension filters we always send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetQuery {
    pub code: &'static str,
    pub filters: &'static [(&'static str, &'static str)],
}

/// Real GDP per capita, chain-linked 2010 euros.
pub const OUTPUT: DatasetQuery = DatasetQuery {
    code: "sdg_08_10",
    filters: &[("na_item", "B1GQ"), ("unit", "CLV10_EUR_HAB")],
};

/// Same dataset with every unit; the normalizer picks the one it knows.
pub const OUTPUT_ANY_UNIT: DatasetQuery = DatasetQuery {
    code: "sdg_08_10",
    filters: &[("na_item", "B1GQ")],
};

pub const LIFE_EXPECTANCY: DatasetQuery = DatasetQuery {
    code: "demo_mlexpec",
    filters: &[("sex", "T"), ("age", "Y1")],
};

pub const POPULATION: DatasetQuery = DatasetQuery {
    code: "demo_pjan",
    filters: &[("sex", "T"), ("age", "TOTAL")],
};

impl DatasetQuery {
    pub fn for_indicator(indicator: Indicator) -> Self {
        match indicator {
            Indicator::Output => OUTPUT,
            Indicator::LifeExpectancy => LIFE_EXPECTANCY,
            Indicator::Population => POPULATION,
        }
    }
}

/// `years_back` calendar years ending at `current`, newest first.
pub fn requested_years(current: Year, years_back: u32) -> Vec<Year> {
    (0..years_back as Year).map(|i| current - i).collect()
}

/// `<base>/<code>?<filters>&geo=..&geo=..&time=..&time=..`
pub fn build_url(base: &str, query: &DatasetQuery, entities: &[Entity], years: &[Year]) -> Result<Url> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), query.code);
    let mut url = Url::parse(&raw).with_context(|| format!("invalid dataset url {:?}", raw))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query.filters {
            pairs.append_pair(k, v);
        }
        for e in entities {
            pairs.append_pair("geo", e.code());
        }
        for y in years {
            pairs.append_pair("time", &y.to_string());
        }
    }
    Ok(url)
}

/// Split `entities` so each request stays addressable. A single request is
/// used whenever the full URL fits in `max_url_len`.
pub fn entity_batches<'a>(
    base: &str,
    query: &DatasetQuery,
    entities: &'a [Entity],
    years: &[Year],
    max_url_len: usize,
    batch_size: usize,
) -> Result<Vec<&'a [Entity]>> {
    let full = build_url(base, query, entities, years)?;
    if full.as_str().len() <= max_url_len || entities.is_empty() {
        return Ok(vec![entities]);
    }
    Ok(entities.chunks(batch_size.max(1)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BASE_URL;

    #[test]
    fn sixteen_years_newest_first() {
        let years = requested_years(2025, 16);
        assert_eq!(years.len(), 16);
        assert_eq!(years.first(), Some(&2025));
        assert_eq!(years.last(), Some(&2010));
    }

    #[test]
    fn url_repeats_geo_and_time() -> Result<()> {
        let url = build_url(
            DEFAULT_BASE_URL,
            &OUTPUT,
            &[Entity::BE, Entity::EL],
            &[2021, 2020],
        )?;
        assert_eq!(
            url.as_str(),
            "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/sdg_08_10\
             ?na_item=B1GQ&unit=CLV10_EUR_HAB&geo=BE&geo=EL&time=2021&time=2020"
        );
        Ok(())
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() -> Result<()> {
        let url = build_url("http://localhost:9000/data/", &POPULATION, &[], &[2020])?;
        assert_eq!(url.path(), "/data/demo_pjan");
        Ok(())
    }

    #[test]
    fn short_url_is_a_single_request() -> Result<()> {
        let years = requested_years(2025, 16);
        let batches = entity_batches(DEFAULT_BASE_URL, &OUTPUT, &Entity::ALL, &years, 2000, 10)?;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 27);
        Ok(())
    }

    #[test]
    fn long_url_splits_into_batches_of_ten() -> Result<()> {
        let years = requested_years(2025, 16);
        let batches = entity_batches(DEFAULT_BASE_URL, &OUTPUT, &Entity::ALL, &years, 300, 10)?;
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 7]);
        assert_eq!(batches[2][0], Entity::ALL[20]);
        Ok(())
    }

    #[test]
    fn bad_base_is_an_error() {
        assert!(build_url("not a url", &OUTPUT, &[Entity::AT], &[2020]).is_err());
    }
}
