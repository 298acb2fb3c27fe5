//! Daily price rows — raw (as fetched) and canonical (deduplicated).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV observation as fetched from the provider.
///
/// Immutable once persisted; keyed by (symbol, trade_date, ingestion_date).
/// The same (symbol, trade_date) may appear under several ingestion dates;
/// canonicalization keeps the latest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Split/dividend-adjusted close. Falls back to `close` when the
    /// provider omits it.
    pub adj_close: f64,
    pub volume: u64,
    pub ingestion_date: NaiveDate,
}

impl RawPriceRecord {
    /// Basic OHLCV sanity check: high >= low, prices positive, OHLC inside
    /// the high/low range.
    pub fn is_sane(&self) -> bool {
        if self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Deduplicated daily row: exactly one per (symbol, trade_date), latest
/// ingestion wins. Ordered ascending by trade_date within a symbol's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPriceRow {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl CanonicalPriceRow {
    pub fn from_raw(raw: RawPriceRecord) -> Self {
        Self {
            symbol: raw.symbol,
            trade_date: raw.trade_date,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            adj_close: raw.adj_close,
            volume: raw.volume,
        }
    }
}
