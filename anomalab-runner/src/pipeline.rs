//! End-to-end scan pipeline: ingest → canonical rebuild → signal ranking.
//!
//! Per-symbol fetch failures are isolated and reported; a run with failures
//! still ranks the symbols that succeeded and lists the omissions. Whether a
//! partial result is acceptable is the caller's policy.

use crate::config::{ConfigError, ScanConfig};
use anomalab_core::client::{ClientError, MarketData};
use anomalab_core::domain::universe::active_symbols;
use anomalab_core::domain::{RawNewsRecord, RawPriceRecord, SignalVector};
use anomalab_core::fetch::{FetchProgress, FetchSummary, ParallelFetcher};
use anomalab_core::signals::SignalEngine;
use anomalab_core::store::{BronzeStore, CanonicalBuilder, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("universe listing returned no symbols")]
    EmptyUniverse,

    #[error("no price history ingested for any symbol")]
    NoPrices,

    #[error("canonical price table is empty; run ingest first")]
    EmptyCanonical,
}

/// What one ingest run fetched and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub ingestion_date: NaiveDate,
    pub universe_size: usize,
    pub prices: FetchSummary,
    pub news: FetchSummary,
}

/// What one canonical rebuild produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    pub price_rows: usize,
    pub universe_rows: usize,
    /// BLAKE3 over the canonical table; identical bronze input gives an
    /// identical hash.
    pub content_hash: String,
}

/// The ranked output of a scan, plus the symbols it had to leave out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_date: NaiveDate,
    pub universe_size: usize,
    pub ranked: Vec<SignalVector>,
    /// (symbol, reason) pairs for symbols whose fetch failed in the ingest
    /// that fed this scan. Empty for scans over previously ingested data.
    pub omitted: Vec<(String, String)>,
}

/// Fetch the universe, price histories, and news, and persist one bronze
/// partition per dataset keyed by today's date.
pub fn ingest(
    config: &ScanConfig,
    client: &dyn MarketData,
    progress: &dyn FetchProgress,
) -> Result<IngestReport, ScanError> {
    config.validate()?;
    let store = BronzeStore::new(&config.data_root);
    let ingestion_date = chrono::Local::now().date_naive();

    let universe = client.list_universe()?;
    if universe.is_empty() {
        return Err(ScanError::EmptyUniverse);
    }
    store.write_universe(ingestion_date, &universe)?;
    let symbols = active_symbols(&universe);

    let fetcher = ParallelFetcher::new(config.worker_pool_size)
        .map_err(|e| ScanError::Config(e.into()))?;

    let start = ingestion_date - chrono::Duration::days(config.price_lookback_days as i64);
    let price_outcome = fetcher.fetch_all(
        &symbols,
        |symbol| client.fetch_price_history(symbol, start, ingestion_date),
        progress,
    );
    let price_summary = price_outcome.summary.clone();
    let mut price_records: Vec<RawPriceRecord> = price_outcome
        .into_successes()
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();
    if price_records.is_empty() {
        return Err(ScanError::NoPrices);
    }
    // The partition key is authoritative: records are stamped at persist
    // time, whatever the client put there at fetch time.
    for record in &mut price_records {
        record.ingestion_date = ingestion_date;
    }
    store.write_prices(ingestion_date, &price_records)?;

    let news_outcome = fetcher.fetch_all(
        &symbols,
        |symbol| client.fetch_recent_news(symbol, config.news_lookback_days),
        progress,
    );
    let news_summary = news_outcome.summary.clone();
    let news_records: Vec<RawNewsRecord> = news_outcome
        .into_successes()
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();
    if !news_records.is_empty() {
        store.write_news(ingestion_date, &news_records)?;
    }

    Ok(IngestReport {
        ingestion_date,
        universe_size: symbols.len(),
        prices: price_summary,
        news: news_summary,
    })
}

/// Rebuild the canonical tables from every bronze partition. Idempotent.
pub fn rebuild(config: &ScanConfig) -> Result<RebuildReport, ScanError> {
    let store = BronzeStore::new(&config.data_root);
    let builder = CanonicalBuilder::new(&config.data_root);
    let table = builder.rebuild(&store)?;
    let universe = builder.rebuild_universe(&store)?;
    Ok(RebuildReport {
        price_rows: table.row_count(),
        universe_rows: universe.len(),
        content_hash: table.content_hash(),
    })
}

/// Rebuild the canonical tables, then compute the ranked signal vectors.
///
/// `run_date` defaults to the latest canonical trade date; `min_score`
/// defaults to the configured cutoff.
pub fn scan(
    config: &ScanConfig,
    run_date: Option<NaiveDate>,
    min_score: Option<f64>,
) -> Result<ScanReport, ScanError> {
    config.validate()?;
    let store = BronzeStore::new(&config.data_root);
    let builder = CanonicalBuilder::new(&config.data_root);

    let table = builder.rebuild(&store)?;
    let run_date = match run_date.or_else(|| table.latest_trade_date()) {
        Some(date) => date,
        None => return Err(ScanError::EmptyCanonical),
    };

    // Prefer the ingested universe; fall back to every symbol with prices.
    let universe_rows = builder.rebuild_universe(&store)?;
    let universe: Vec<String> = if universe_rows.is_empty() {
        table.symbols().map(String::from).collect()
    } else {
        active_symbols(&universe_rows)
    };

    let engine = SignalEngine::new(config.signals.clone())
        .map_err(|e| ScanError::Config(e.into()))?;
    let min_score = min_score.unwrap_or(config.signals.min_score);
    let ranked = engine.compute(&table, run_date, &universe, min_score);

    Ok(ScanReport {
        run_date,
        universe_size: universe.len(),
        ranked,
        omitted: Vec::new(),
    })
}

/// Ingest, rebuild, and scan in one pass, carrying fetch omissions into the
/// scan report.
pub fn run_full(
    config: &ScanConfig,
    client: &dyn MarketData,
    progress: &dyn FetchProgress,
    run_date: Option<NaiveDate>,
    min_score: Option<f64>,
) -> Result<(IngestReport, ScanReport), ScanError> {
    let ingest_report = ingest(config, client, progress)?;
    let mut scan_report = scan(config, run_date, min_score)?;
    scan_report.omitted = ingest_report.prices.failures.clone();
    Ok((ingest_report, scan_report))
}
