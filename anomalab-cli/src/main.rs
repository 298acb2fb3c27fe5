//! Anomalab CLI — daily anomaly scanner commands.
//!
//! Commands:
//! - `ingest` — fetch universe, price histories, and news into bronze
//! - `rebuild` — rebuild the canonical (silver) tables from bronze
//! - `scan` — rank the universe for a run date and export artifacts
//! - `status` — report bronze partitions and canonical row counts

use anomalab_core::client::FmpClient;
use anomalab_core::fetch::StdoutProgress;
use anomalab_core::limiter::RateLimiter;
use anomalab_core::store::{BronzeStore, CanonicalBuilder};
use anomalab_runner::{pipeline, report, ScanConfig};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "anomalab", about = "Anomalab CLI — daily market anomaly scanner")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch universe, price histories, and news into the bronze store.
    Ingest,
    /// Rebuild the canonical tables from every bronze partition.
    Rebuild,
    /// Rank the universe for a run date and write report artifacts.
    Scan {
        /// Run date (YYYY-MM-DD). Defaults to the latest canonical date.
        #[arg(long)]
        run_date: Option<String>,

        /// Minimum interestingness score. Defaults to the configured cutoff.
        #[arg(long)]
        min_score: Option<f64>,

        /// Rows shown in the terminal preview.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Re-ingest before scanning.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,
    },
    /// Report bronze partitions and canonical row counts.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest => cmd_ingest(&config),
        Commands::Rebuild => cmd_rebuild(&config),
        Commands::Scan {
            run_date,
            min_score,
            top,
            refresh,
            output_dir,
        } => cmd_scan(&config, run_date, min_score, top, refresh, &output_dir),
        Commands::Status => cmd_status(&config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let config = ScanConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Build the live client: API key from `FMP_API_KEY`, limiter from config.
fn build_client(config: &ScanConfig) -> Result<FmpClient> {
    let api_key = std::env::var("FMP_API_KEY")
        .context("FMP_API_KEY is not set; export it before ingesting")?;
    let limiter = Arc::new(RateLimiter::new(config.call_budget()?));
    Ok(FmpClient::new(api_key, limiter)?)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn cmd_ingest(config: &ScanConfig) -> Result<()> {
    let client = build_client(config)?;
    let report = pipeline::ingest(config, &client, &StdoutProgress)?;
    println!(
        "Ingested partition {}: {} symbols, prices {}/{} ok, news {}/{} ok",
        report.ingestion_date,
        report.universe_size,
        report.prices.succeeded,
        report.prices.total,
        report.news.succeeded,
        report.news.total,
    );
    if !report.prices.failures.is_empty() {
        println!("Price fetch failures:");
        for (symbol, reason) in &report.prices.failures {
            println!("  {symbol}: {reason}");
        }
    }
    Ok(())
}

fn cmd_rebuild(config: &ScanConfig) -> Result<()> {
    let report = pipeline::rebuild(config)?;
    println!(
        "Canonical rebuild: {} price rows, {} universe rows, hash {}",
        report.price_rows,
        report.universe_rows,
        &report.content_hash[..16.min(report.content_hash.len())]
    );
    Ok(())
}

fn cmd_scan(
    config: &ScanConfig,
    run_date: Option<String>,
    min_score: Option<f64>,
    top: usize,
    refresh: bool,
    output_dir: &std::path::Path,
) -> Result<()> {
    let run_date = run_date.as_deref().map(parse_date).transpose()?;

    let scan_report = if refresh {
        let client = build_client(config)?;
        let (_, scan_report) =
            pipeline::run_full(config, &client, &StdoutProgress, run_date, min_score)?;
        scan_report
    } else {
        pipeline::scan(config, run_date, min_score)?
    };

    if scan_report.ranked.is_empty() && scan_report.omitted.is_empty() {
        bail!("no symbols ranked for {}", scan_report.run_date);
    }

    print!("{}", report::preview(&scan_report, top));
    let (json_path, csv_path) = report::save_artifacts(output_dir, &scan_report)?;
    println!(
        "Artifacts: {} and {}",
        json_path.display(),
        csv_path.display()
    );
    Ok(())
}

fn cmd_status(config: &ScanConfig) -> Result<()> {
    let store = BronzeStore::new(&config.data_root);
    let partitions = store.price_partitions()?;
    match (partitions.first(), partitions.last()) {
        (Some(first), Some(last)) => println!(
            "Bronze price partitions: {} ({first} .. {last})",
            partitions.len()
        ),
        _ => println!("Bronze price partitions: none"),
    }

    let builder = CanonicalBuilder::new(&config.data_root);
    match builder.load() {
        Ok(table) => println!(
            "Canonical table: {} rows, {} symbols, latest {}",
            table.row_count(),
            table.symbols().count(),
            table
                .latest_trade_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into())
        ),
        Err(_) => println!("Canonical table: not built (run `anomalab rebuild`)"),
    }
    Ok(())
}
