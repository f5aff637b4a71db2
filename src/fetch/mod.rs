// src/fetch/mod.rs

pub mod batch;
pub mod urls;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use reqwest::Client;
use std::{collections::BTreeMap, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::{
    config::Config,
    decode::StatPayload,
    entity::Entity,
    indicator::Indicator,
    table::Year,
};
use urls::{build_url, entity_batches, requested_years, DatasetQuery, OUTPUT_ANY_UNIT};

/// Every payload fetched in one load, per indicator (one per entity batch).
#[derive(Debug, Default)]
pub struct RemoteResponses {
    payloads: BTreeMap<Indicator, Vec<StatPayload>>,
}

impl RemoteResponses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, indicator: Indicator, payload: StatPayload) {
        self.payloads.entry(indicator).or_default().push(payload);
    }

    pub fn get(&self, indicator: Indicator) -> &[StatPayload] {
        self.payloads.get(&indicator).map_or(&[][..], Vec::as_slice)
    }

    pub fn payload_count(&self) -> usize {
        self.payloads.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.payload_count() == 0
    }
}

/// One GET of a dataset URL. Eurostat answers some bad queries with a JSON
/// `error` body and a 4xx status; the status is what fails the attempt here.
async fn get_dataset_text(client: &Client, url: &Url) -> Result<String> {
    debug!(dataset = url.path(), "requesting");
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("request to {} did not complete", url.path()))?;
    let status = response.status();
    if !status.is_success() {
        bail!("{} answered {}", url.path(), status);
    }
    response
        .text()
        .await
        .with_context(|| format!("reading body of {}", url.path()))
}

/// GET with exponential backoff: attempt `n` (1-based) is preceded by a
/// `initial_backoff_ms * 2^(n - 2)` wait, so the first retry waits the
/// initial backoff. At most `max_retries + 1` attempts are made.
pub async fn get_text_with_retry(
    client: &Client,
    url: &Url,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<String> {
    let mut delay = Duration::from_millis(initial_backoff_ms);
    let mut attempt = 0;
    let last = loop {
        attempt += 1;
        let err = match get_dataset_text(client, url).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        if attempt > max_retries {
            break err;
        }
        warn!(
            dataset = url.path(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "dataset request failed; backing off"
        );
        sleep(delay).await;
        delay = delay.saturating_mul(2);
    };
    error!(dataset = url.path(), attempts = attempt, error = %last, "giving up on dataset");
    Err(last.context(format!("{} attempt(s) against {}", attempt, url.path())))
}

async fn fetch_payload(client: &Client, config: &Config, url: &Url) -> Result<StatPayload> {
    let text = get_text_with_retry(client, url, config.max_retries, config.backoff_ms).await?;
    StatPayload::from_json(&text).with_context(|| format!("decoding payload from {}", url))
}

/// The unit-filtered Output query came back without usable content.
fn needs_unit_fallback(payload: &StatPayload) -> bool {
    payload.error.is_none()
        && (payload.value_count() == 0 || payload.dimension_size("unit") == Some(0))
}

async fn fetch_batch(
    client: &Client,
    config: &Config,
    indicator: Indicator,
    entities: &[Entity],
    years: &[Year],
) -> Result<StatPayload> {
    let query = DatasetQuery::for_indicator(indicator);
    let url = build_url(&config.base_url, &query, entities, years)?;
    let payload = fetch_payload(client, config, &url).await?;
    if indicator != Indicator::Output || !needs_unit_fallback(&payload) {
        return Ok(payload);
    }

    info!(entities = entities.len(), "output empty for the preferred unit; refetching without unit filter");
    let url = build_url(&config.base_url, &OUTPUT_ANY_UNIT, entities, years)?;
    match fetch_payload(client, config, &url).await {
        Ok(any_unit) if any_unit.value_count() > 0 => Ok(any_unit),
        Ok(_) => Ok(payload),
        Err(e) => {
            warn!(error = %e, "refetch without unit filter failed");
            Ok(payload)
        }
    }
}

/// Fetch one indicator, batching entities when the URL would be too long.
/// A failed batch only loses its own entities.
#[instrument(level = "info", skip(client, config, years), fields(years = years.len()))]
pub async fn fetch_indicator(
    client: &Client,
    config: &Config,
    indicator: Indicator,
    years: &[Year],
) -> Vec<StatPayload> {
    let query = DatasetQuery::for_indicator(indicator);
    let batches = match entity_batches(
        &config.base_url,
        &query,
        &Entity::ALL,
        years,
        config.max_url_len,
        config.batch_size,
    ) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "cannot build request urls");
            return Vec::new();
        }
    };
    debug!(batches = batches.len(), "planned requests");

    let results = batch::gather(batches, config.max_concurrency, |entities| {
        fetch_batch(client, config, indicator, entities, years)
    })
    .await;
    let payloads: Vec<StatPayload> = results.into_iter().flatten().collect();
    info!(payloads = payloads.len(), "fetched");
    payloads
}

/// Fetch all indicators concurrently for the configured year window.
#[instrument(level = "info", skip_all, fields(base_url = %config.base_url))]
pub async fn fetch_all(client: &Client, config: &Config) -> RemoteResponses {
    let years = requested_years(Utc::now().year(), config.years_back);
    let (output, life, population) = tokio::join!(
        fetch_indicator(client, config, Indicator::Output, &years),
        fetch_indicator(client, config, Indicator::LifeExpectancy, &years),
        fetch_indicator(client, config, Indicator::Population, &years),
    );

    let mut responses = RemoteResponses::new();
    for (indicator, payloads) in [
        (Indicator::Output, output),
        (Indicator::LifeExpectancy, life),
        (Indicator::Population, population),
    ] {
        for p in payloads {
            responses.push(indicator, p);
        }
    }
    responses
}
