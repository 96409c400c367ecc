//! churn-runner: headless batch runner for the churn-risk pipeline.
//!
//! Usage:
//!   churn-runner --db book.db --as-of 2024-12-31
//!   churn-runner --synthetic 5000 --seed 42 --report calibration.json
//!   churn-runner --db book.db --config data/pipeline_config.json --never-transacted excluded

use anyhow::{Context, Result};
use chrono::NaiveDate;
use churnrisk_core::{
    config::{NeverTransactedPolicy, PipelineConfig},
    generator::SyntheticSnapshot,
    pipeline::{PipelineOutput, PipelineRunner},
    segmenter::RiskSegment,
    store::ChurnStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let seed = parse_arg(&args, "--seed", 42u64);
    let synthetic = parse_arg(&args, "--synthetic", 0usize);

    let mut config = match arg_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::new(chrono::Local::now().date_naive()),
    };
    if let Some(as_of) = arg_value(&args, "--as-of") {
        config.as_of = NaiveDate::parse_from_str(as_of, "%Y-%m-%d")
            .with_context(|| format!("--as-of '{as_of}' is not a YYYY-MM-DD date"))?;
    }
    if let Some(policy) = arg_value(&args, "--never-transacted") {
        config.never_transacted = match policy {
            "churned"  => NeverTransactedPolicy::Churned,
            "excluded" => NeverTransactedPolicy::Excluded,
            other      => anyhow::bail!("--never-transacted must be churned or excluded, got '{other}'"),
        };
    }

    let run_id = arg_value(&args, "--run-id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));

    println!("churn-runner: churn risk pipeline");
    println!("  run_id:    {run_id}");
    println!("  as_of:     {}", config.as_of);
    println!("  db:        {db}");
    if synthetic > 0 {
        println!("  synthetic: {synthetic} customers (seed {seed})");
    }
    println!();

    let store = if db == ":memory:" {
        ChurnStore::in_memory()?
    } else {
        ChurnStore::open(db)?
    };
    store.migrate()?;

    if synthetic > 0 {
        let snapshot = SyntheticSnapshot::new(synthetic, config.as_of).generate(seed);
        store.replace_snapshot(&snapshot)?;
    }

    let runner = PipelineRunner::new(run_id.clone(), config, store);
    let output = runner.execute()?;
    print_summary(&output, &run_id);

    if let Some(path) = arg_value(&args, "--report") {
        let json = serde_json::to_string_pretty(&output.report)?;
        std::fs::write(path, json).with_context(|| format!("Cannot write {path}"))?;
        log::info!("runner: calibration report written to {path}");
    }

    Ok(())
}

fn print_summary(output: &PipelineOutput, run_id: &str) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:              {run_id}");
    println!("  customers:           {}", output.customer_count());
    println!("  orphan cards:        {}", output.orphans.cards);
    println!("  orphan transactions: {}", output.orphans.transactions);
    for segment in RiskSegment::ALL {
        println!(
            "  {:<20} {}",
            format!("{}:", segment.as_str().to_lowercase()),
            output.segment_count(segment)
        );
    }

    println!();
    println!("=== CALIBRATION ===");
    if output.report.rows.is_empty() {
        println!("  (No customers in snapshot)");
        return;
    }
    println!("  {:<12} | {:>9} | {:>7} | {:>9} | {:>7}", "segment", "customers", "churned", "unlabeled", "rate");
    for row in &output.report.rows {
        let rate = row
            .churn_rate
            .map(|r| format!("{r:.2}%"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<12} | {:>9} | {:>7} | {:>9} | {:>7}",
            row.segment.as_str(),
            row.customer_count,
            row.churned_count,
            row.unlabeled_count,
            rate
        );
    }
    if !output.report.is_monotone() {
        println!("  WARNING: churn does not rise from Low to High risk");
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
