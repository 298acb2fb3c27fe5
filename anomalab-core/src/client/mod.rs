//! Market data client — trait and structured error taxonomy.
//!
//! The `MarketData` trait abstracts over the upstream provider so the fetch
//! orchestrator and pipeline can be exercised against in-process fakes.

pub mod fmp;

pub use fmp::FmpClient;

use crate::domain::{RawNewsRecord, RawPriceRecord, UniverseRecord};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured errors for provider operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid client construction or parameters. Fatal; raised before any
    /// network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure (connect, timeout). Retryable by the caller
    /// with backoff; the client itself never retries.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Semantic rejection from the provider (non-success status). Not
    /// retryable.
    #[error("upstream rejected request (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    /// The provider reported throttling even though local rate governance
    /// admitted the call. Signals a bug or an externally shared quota; must
    /// never be conflated with `Transient`.
    #[error("upstream quota desync (HTTP 429): {0}")]
    QuotaDesync(String),

    /// Response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Whether the caller may retry the operation with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Upstream market data operations. Every implementation routes each network
/// request through a shared [`RateLimiter`](crate::limiter::RateLimiter),
/// acquiring exactly one slot per request, before the request is issued.
pub trait MarketData: Send + Sync {
    /// List the current universe. One rate-limited call.
    fn list_universe(&self) -> Result<Vec<UniverseRecord>, ClientError>;

    /// Daily price history for one symbol over `[start, end]`, ascending by
    /// trade date. An empty result is valid (delisted or no data), not an
    /// error.
    fn fetch_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawPriceRecord>, ClientError>;

    /// Recent news for one symbol, newest first, limited to the lookback
    /// window. An empty result is valid.
    fn fetch_recent_news(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<RawNewsRecord>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_transient() {
        assert!(ClientError::Transient("timeout".into()).is_transient());
        assert!(!ClientError::Upstream {
            status: 404,
            message: "unknown symbol".into()
        }
        .is_transient());
        assert!(!ClientError::QuotaDesync("429".into()).is_transient());
        assert!(!ClientError::Config("no key".into()).is_transient());
    }
}
