//! Run Window Inspection Tool
//!
//! CLI tool to fetch one lookback window from the run-record store and print
//! the aggregate, either human-readable or as JSON.
//!
//! Usage:
//!   cargo run --bin run_inspect -- --store-url http://localhost:5000 --days 30
//!   cargo run --bin run_inspect -- --days 5 --json
//!   cargo run --bin run_inspect -- --days 10 --strict --numeric-versions

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use runlog_backend::{
    aggregate::{aggregate, AggregateOptions, RecordPolicy, VersionOrdering},
    models::WINDOW_MENU,
    store::RunStoreClient,
};

/// Fetch and summarize one window of simulation run records
#[derive(Parser, Debug)]
#[command(name = "run_inspect")]
#[command(about = "Fetch and summarize one window of simulation run records")]
struct Cli {
    /// Base URL of the run-record store
    #[arg(long, env = "STORE_URL", default_value = "http://localhost:5000")]
    store_url: String,

    /// Lookback window in days
    #[arg(short, long, default_value_t = 30)]
    days: u32,

    /// Abort on the first malformed record instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Compare version numbers numerically instead of as strings
    #[arg(long)]
    numeric_versions: bool,

    /// Print the raw aggregate as JSON
    #[arg(long)]
    json: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.days == 0 {
        bail!("--days must be positive");
    }
    if !WINDOW_MENU.contains(&cli.days) {
        eprintln!(
            "note: {} days is outside the dashboard menu {WINDOW_MENU:?}",
            cli.days
        );
    }

    let client = RunStoreClient::new(cli.store_url.clone(), Duration::from_secs(cli.timeout));
    let docs = client
        .fetch_documents(cli.days)
        .await
        .with_context(|| format!("failed to fetch {} days from {}", cli.days, cli.store_url))?;

    let options = AggregateOptions {
        policy: if cli.strict {
            RecordPolicy::Strict
        } else {
            RecordPolicy::Tolerant
        },
        version_ordering: if cli.numeric_versions {
            VersionOrdering::Numeric
        } else {
            VersionOrdering::Lexicographic
        },
    };
    let result = aggregate(&docs, cli.days, options)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let summary = &result.summary;
    println!(
        "Window: last {} days ({} records, {} skipped)",
        cli.days, summary.total_runs, result.skipped
    );
    println!("Newest version:   {}", summary.newest_version);
    println!("Average runs/day: {:.3}", summary.average_runs_per_day);
    match &summary.newest_run {
        Some(run) => println!(
            "Most recent run:  {} (domain {}, {} cores, global {})",
            run.objid, run.domain, run.core_count, run.globalid
        ),
        None => println!("Most recent run:  n/a"),
    }
    match &summary.oldest_run {
        Some(run) => println!(
            "Oldest run:       {} (domain {}, {} cores, global {})",
            run.objid, run.domain, run.core_count, run.globalid
        ),
        None => println!("Oldest run:       n/a"),
    }

    println!("Runs per day:");
    for (label, count) in result.histogram.labels.iter().zip(&result.histogram.counts) {
        println!("  {label}  {count}");
    }

    Ok(())
}
