//! Parallel per-symbol fetch orchestration.
//!
//! Fans a per-symbol operation out over a bounded private thread pool and
//! collects tagged per-symbol results. The pool bounds concurrency only; the
//! shared rate limiter inside the client is the true throttle, so the pool is
//! typically wider than the quota would suggest.

use crate::client::ClientError;
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("worker_pool_size must be positive")]
pub struct PoolSizeError;

/// Progress callbacks for multi-symbol operations.
///
/// Callbacks fire from worker threads, concurrently.
pub trait FetchProgress: Send + Sync {
    /// Called when a symbol's fetch is dispatched.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol's fetch completes. `error` is `None` on success.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, error: Option<&ClientError>);

    /// Called once after the whole batch.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, error: Option<&ClientError>) {
        match error {
            None => println!("  OK: {symbol}"),
            Some(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nFetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that says nothing.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _s: &str, _i: usize, _t: usize, _e: Option<&ClientError>) {}
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

/// Summary of a fan-out: counts plus per-symbol failure reasons, for the
/// caller to decide whether partial results are acceptable.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Per-symbol tagged results plus the batch summary.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub results: BTreeMap<String, Result<T, ClientError>>,
    pub summary: FetchSummary,
}

impl<T> FetchOutcome<T> {
    /// Successful results in symbol order, consuming the outcome.
    pub fn into_successes(self) -> Vec<(String, T)> {
        self.results
            .into_iter()
            .filter_map(|(sym, res)| res.ok().map(|v| (sym, v)))
            .collect()
    }
}

/// Bounded worker pool running one fetch operation per symbol.
///
/// One symbol's failure never cancels or corrupts another symbol's work;
/// every symbol ends up in the result map as either a value or a captured
/// error.
#[derive(Debug)]
pub struct ParallelFetcher {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl ParallelFetcher {
    /// Build a private pool of `workers` threads (never the global pool).
    pub fn new(workers: usize) -> Result<Self, PoolSizeError> {
        if workers == 0 {
            return Err(PoolSizeError);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .expect("failed to build fetch thread pool");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` for every symbol on the pool and collect tagged results.
    pub fn fetch_all<T, F>(
        &self,
        symbols: &[String],
        op: F,
        progress: &dyn FetchProgress,
    ) -> FetchOutcome<T>
    where
        T: Send,
        F: Fn(&str) -> Result<T, ClientError> + Sync,
    {
        let total = symbols.len();

        let collected: Vec<(String, Result<T, ClientError>)> = self.pool.install(|| {
            symbols
                .par_iter()
                .enumerate()
                .map(|(i, symbol)| {
                    progress.on_start(symbol, i, total);
                    let result = op(symbol);
                    progress.on_complete(symbol, i, total, result.as_ref().err());
                    (symbol.clone(), result)
                })
                .collect()
        });

        let mut results = BTreeMap::new();
        let mut failures = Vec::new();
        for (symbol, result) in collected {
            if let Err(e) = &result {
                failures.push((symbol.clone(), e.to_string()));
            }
            results.insert(symbol, result);
        }
        failures.sort();

        let failed = failures.len();
        let summary = FetchSummary {
            total,
            succeeded: total - failed,
            failed,
            failures,
        };
        progress.on_batch_complete(summary.succeeded, summary.failed, total);

        FetchOutcome { results, summary }
    }
}
