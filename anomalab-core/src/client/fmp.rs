//! Financial Modeling Prep client.
//!
//! Thin blocking HTTP wrapper over the stable REST endpoints the scanner
//! uses: universe constituents, end-of-day price history, and stock news.
//! Every request acquires one slot from the shared rate limiter before it is
//! issued — never after, never batched.
//!
//! The EOD endpoint is inconsistent upstream: it may return a bare list of
//! bars or a `{"historical": [...]}` wrapper. Both shapes are normalized
//! here; keep that in mind before "fixing" either branch.

use super::{ClientError, MarketData};
use crate::domain::{RawNewsRecord, RawPriceRecord, UniverseRecord};
use crate::limiter::RateLimiter;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Page size for the news endpoint; it only reaches back a few days anyway.
const NEWS_PAGE_LIMIT: u32 = 50;

/// Blocking client for a Financial-Modeling-Prep-shaped provider.
#[derive(Debug)]
pub struct FmpClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl FmpClient {
    pub fn new(api_key: impl Into<String>, limiter: Arc<RateLimiter>) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config("API key is empty".into()));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            limiter,
        })
    }

    /// Override the base URL (test servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Rate-limited GET returning the JSON-decoded body.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        self.limiter.acquire();

        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .map_err(|e| ClientError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let err = ClientError::QuotaDesync(format!("{path} throttled upstream"));
            eprintln!("WARNING: {err}");
            return Err(err);
        }
        if !status.is_success() {
            let mut message = resp.text().unwrap_or_default();
            message.truncate(200);
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .map_err(|e| ClientError::Malformed(format!("{path}: {e}")))
    }
}

impl MarketData for FmpClient {
    fn list_universe(&self) -> Result<Vec<UniverseRecord>, ClientError> {
        let rows: Vec<ConstituentRow> = self.get_json("/stable/sp500-constituent", &[])?;
        Ok(rows.into_iter().map(ConstituentRow::into_record).collect())
    }

    fn fetch_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawPriceRecord>, ClientError> {
        let resp: HistoryResponse =
            self.get_json("/stable/historical-price-eod/full", &[("symbol", symbol)])?;
        let ingestion_date = chrono::Local::now().date_naive();
        Ok(normalize_history(symbol, resp.into_bars(), start, end, ingestion_date))
    }

    fn fetch_recent_news(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<RawNewsRecord>, ClientError> {
        let limit = NEWS_PAGE_LIMIT.to_string();
        let rows: Vec<NewsRow> = self.get_json(
            "/stable/news/stock",
            &[("symbols", symbol), ("limit", limit.as_str())],
        )?;
        let cutoff = chrono::Local::now().naive_local() - chrono::Duration::days(lookback_days as i64);
        Ok(normalize_news(symbol, rows, cutoff))
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ConstituentRow {
    symbol: String,
    name: String,
    sector: Option<String>,
    #[serde(rename = "subSector")]
    sub_sector: Option<String>,
}

impl ConstituentRow {
    fn into_record(self) -> UniverseRecord {
        UniverseRecord {
            symbol: self.symbol,
            company_name: self.name,
            sector: self.sector.unwrap_or_default(),
            sub_sector: self.sub_sector.unwrap_or_default(),
        }
    }
}

/// The EOD endpoint returns either a bare list or a `historical` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Bare(Vec<EodBar>),
    Wrapped { historical: Vec<EodBar> },
}

impl HistoryResponse {
    fn into_bars(self) -> Vec<EodBar> {
        match self {
            HistoryResponse::Bare(bars) => bars,
            HistoryResponse::Wrapped { historical } => historical,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EodBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(rename = "adjClose")]
    adj_close: Option<f64>,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct NewsRow {
    #[serde(rename = "publishedDate")]
    published_date: String,
    title: String,
    #[serde(default)]
    text: String,
}

// ── Normalization ───────────────────────────────────────────────────

/// Filter bars to `[start, end]`, stamp the symbol and ingestion date, and
/// sort ascending (the endpoint returns newest first).
fn normalize_history(
    symbol: &str,
    bars: Vec<EodBar>,
    start: NaiveDate,
    end: NaiveDate,
    ingestion_date: NaiveDate,
) -> Vec<RawPriceRecord> {
    let mut records: Vec<RawPriceRecord> = bars
        .into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .map(|b| RawPriceRecord {
            symbol: symbol.to_string(),
            trade_date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            adj_close: b.adj_close.unwrap_or(b.close),
            volume: b.volume.max(0.0) as u64,
            ingestion_date,
        })
        .collect();
    records.sort_by_key(|r| r.trade_date);
    records
}

/// Keep rows newer than the cutoff, newest first. Rows whose timestamp
/// cannot be parsed are dropped rather than failing the whole batch.
fn normalize_news(symbol: &str, rows: Vec<NewsRow>, cutoff: NaiveDateTime) -> Vec<RawNewsRecord> {
    let mut records: Vec<RawNewsRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let published_at = parse_published(&row.published_date)?;
            Some(RawNewsRecord {
                symbol: symbol.to_string(),
                published_at,
                headline: row.title,
                snippet: row.text,
            })
        })
        .filter(|r| r.published_at >= cutoff)
        .collect();
    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    records
}

/// The news feed mixes `2025-06-02 14:30:00`, ISO `T` timestamps, and plain
/// dates.
fn parse_published(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
