use anyhow::Result;
use clap::Parser;
use eustat::{
    anomaly,
    local::{normalize_records, read_records},
    logging,
    scale::derive_scales,
    Config, Indicator, ObservationTable,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Normalize a local indicator file and report what it holds")]
struct Args {
    /// Local records file; the configured path when omitted.
    file: Option<PathBuf>,
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init("warn");

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let path = args.file.unwrap_or_else(|| config.local_data_path.clone());

    let records = read_records(&path)?;
    let mut table = ObservationTable::new();
    let local = normalize_records(&records, &mut table);
    let anomalies = anomaly::run(&mut table, &config.anomaly);
    info!(path = %path.display(), "checked");

    println!("=== Local file: {} ===", path.display());
    println!("Records:        {}", records.len());
    println!("Accepted:       {}", local.accepted);
    println!("Skipped:        {}", local.skipped);
    println!("Unit-corrected: {}", local.corrected);
    println!("Conflicts:      {}", local.conflicts.len());
    for c in &local.conflicts {
        println!(
            "  {:<16} {} {}  {} -> {} ({:.1}%)",
            c.indicator, c.entity, c.year, c.previous, c.current, c.diff_pct
        );
    }
    println!();

    println!("=== Coverage ===");
    for indicator in Indicator::ALL {
        let years = table.years_of(indicator);
        println!(
            "- {:<16} {:<4} | entities: {:>2} | values: {:>4} | years: {}",
            indicator,
            indicator.local_tag(),
            table.entity_count(indicator),
            table.len(indicator),
            match (years.first(), years.last()) {
                (Some(a), Some(b)) => format!("{}..={}", a, b),
                _ => "-".to_string(),
            }
        );
    }
    println!("Common years:   {:?}", table.common_years());
    println!();

    println!("=== Scales (after correction) ===");
    let scales = derive_scales(&table);
    for indicator in Indicator::SCALED {
        let Some(range) = scales.get(indicator) else {
            continue;
        };
        if range.is_empty() {
            println!("- {:<16} | no data", indicator);
        } else if let (Some(min), Some(max)) = (range.min, range.max) {
            println!("- {:<16} | {:.1} ..= {:.1}", indicator, min, max);
        }
    }
    println!();

    println!("=== Anomalies ===");
    println!("Flagged:        {}", anomalies.scan.flagged);
    println!("Confirmed:      {}", anomalies.scan.confirmed.len());
    for c in &anomalies.corrections {
        println!(
            "  corrected {:<16} {} {}: {} -> {} (/{})",
            c.indicator, c.entity, c.year, c.original, c.corrected, c.factor
        );
    }
    for a in &anomalies.flagged_only {
        println!(
            "  flagged   {:<16} {} {}->{}: {} -> {} ({:.1}%)",
            a.indicator, a.entity, a.from_year, a.to_year, a.from_value, a.to_value, a.change_pct
        );
    }
    Ok(())
}
