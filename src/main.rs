use anyhow::{Context, Result};
use clap::Parser;
use eustat::{
    dataset::LoadReport,
    export::write_parquet,
    fetch::fetch_all,
    local::read_records,
    logging,
    scale::Scales,
    Config, Indicator, Session, Source, Year,
};
use reqwest::Client;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    time::Duration,
};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Load, correct and summarise EU member-state indicators")]
struct Args {
    /// YAML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Skip the Eurostat API and read the local file only.
    #[arg(long)]
    local_only: bool,
    /// Write the corrected table to this Parquet file.
    #[arg(long)]
    export: Option<PathBuf>,
    /// Print a JSON summary of the load to stdout.
    #[arg(long)]
    summary: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    source: Source,
    years: &'a BTreeSet<Year>,
    common_years: &'a [Year],
    latest_averages: Option<(Year, BTreeMap<Indicator, f64>)>,
    scales: &'a Scales,
    report: &'a LoadReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init("info");
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let local_path = config.local_data_path.clone();

    // ─── 3) fetch remote indicators ──────────────────────────────────
    let remote = if args.local_only {
        info!("local only; skipping remote fetch");
        None
    } else {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        let start = Instant::now();
        let responses = fetch_all(&client, &config).await;
        info!(payloads = responses.payload_count(), elapsed = ?start.elapsed(), "remote fetch done");
        if responses.is_empty() {
            warn!("no remote payloads; the local file is the only source");
            None
        } else {
            Some(responses)
        }
    };

    // ─── 4) normalize, correct, derive scales ────────────────────────
    let mut session = Session::new(config);
    let dataset = session.reload(remote.as_ref(), || read_records(&local_path))?;
    info!(
        source = ?dataset.source(),
        years = dataset.years().len(),
        latest = ?dataset.latest_common_year(),
        flagged_only = dataset.report().anomalies.flagged_only.len(),
        "dataset ready"
    );

    // ─── 5) outputs ──────────────────────────────────────────────────
    if let Some(path) = &args.export {
        write_parquet(dataset.table(), path)?;
    }
    if args.summary {
        let summary = Summary {
            source: dataset.source(),
            years: dataset.years(),
            common_years: dataset.common_years(),
            latest_averages: dataset
                .latest_common_year()
                .map(|y| (y, dataset.averages(y))),
            scales: dataset.scales(),
            report: dataset.report(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    info!("done");
    Ok(())
}
