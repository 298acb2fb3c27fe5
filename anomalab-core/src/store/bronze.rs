//! Bronze store — append-only, ingestion-date-partitioned parquet.
//!
//! Layout: `{root}/bronze/{dataset}/ingestion_date=YYYY-MM-DD.parquet`
//! for the `prices`, `universe`, and `news` datasets.
//!
//! A partition is immutable once written for a given key; re-writing the same
//! key replaces the whole partition file (idempotent upsert-by-partition).
//! Writes are atomic: the file is written to a `.tmp` sibling and renamed
//! into place, so a record is either fully persisted or absent. Corrupt
//! partitions are quarantined on read rather than failing the whole rebuild.

use crate::domain::{RawNewsRecord, RawPriceRecord, UniverseRecord};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structured errors for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no {dataset} partition for ingestion_date={ingestion_date}")]
    MissingPartition {
        dataset: String,
        ingestion_date: NaiveDate,
    },
}

const PRICES: &str = "prices";
const UNIVERSE: &str = "universe";
const NEWS: &str = "news";

/// The bronze store rooted at a data directory.
pub struct BronzeStore {
    root: PathBuf,
}

impl BronzeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join("bronze").join(dataset)
    }

    fn partition_path(&self, dataset: &str, ingestion_date: NaiveDate) -> PathBuf {
        self.dataset_dir(dataset)
            .join(format!("ingestion_date={ingestion_date}.parquet"))
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Write one price partition. Every record must carry the partition's
    /// ingestion date; an empty batch is a validation error.
    pub fn write_prices(
        &self,
        ingestion_date: NaiveDate,
        records: &[RawPriceRecord],
    ) -> Result<PathBuf, StoreError> {
        if records.is_empty() {
            return Err(StoreError::Validation("no price records to write".into()));
        }
        if let Some(bad) = records.iter().find(|r| r.ingestion_date != ingestion_date) {
            return Err(StoreError::Validation(format!(
                "record for {} has ingestion_date={}, partition is {ingestion_date}",
                bad.symbol, bad.ingestion_date
            )));
        }
        let df = prices_to_df(records)?;
        self.write_partition(PRICES, ingestion_date, &df)
    }

    pub fn read_prices(&self, ingestion_date: NaiveDate) -> Result<Vec<RawPriceRecord>, StoreError> {
        let path = self.partition_path(PRICES, ingestion_date);
        if !path.exists() {
            return Err(StoreError::MissingPartition {
                dataset: PRICES.into(),
                ingestion_date,
            });
        }
        df_to_prices(&read_parquet(&path)?)
    }

    /// All price records across every partition, in partition order.
    ///
    /// A partition that fails to load is quarantined (renamed aside) with a
    /// warning instead of failing the scan over the healthy partitions.
    pub fn read_all_prices(&self) -> Result<Vec<RawPriceRecord>, StoreError> {
        let mut all = Vec::new();
        for date in self.price_partitions()? {
            let path = self.partition_path(PRICES, date);
            match read_parquet(&path).and_then(|df| df_to_prices(&df)) {
                Ok(records) => all.extend(records),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    eprintln!(
                        "WARNING: quarantining corrupt bronze partition {}: {e}",
                        path.display()
                    );
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }
        Ok(all)
    }

    pub fn price_partitions(&self) -> Result<Vec<NaiveDate>, StoreError> {
        self.list_partitions(PRICES)
    }

    // ── Universe ────────────────────────────────────────────────────

    pub fn write_universe(
        &self,
        ingestion_date: NaiveDate,
        records: &[UniverseRecord],
    ) -> Result<PathBuf, StoreError> {
        if records.is_empty() {
            return Err(StoreError::Validation("no universe records to write".into()));
        }
        let df = universe_to_df(records)?;
        self.write_partition(UNIVERSE, ingestion_date, &df)
    }

    pub fn read_universe(
        &self,
        ingestion_date: NaiveDate,
    ) -> Result<Vec<UniverseRecord>, StoreError> {
        let path = self.partition_path(UNIVERSE, ingestion_date);
        if !path.exists() {
            return Err(StoreError::MissingPartition {
                dataset: UNIVERSE.into(),
                ingestion_date,
            });
        }
        df_to_universe(&read_parquet(&path)?)
    }

    /// The most recent universe partition, if any.
    pub fn latest_universe(&self) -> Result<Option<(NaiveDate, Vec<UniverseRecord>)>, StoreError> {
        match self.list_partitions(UNIVERSE)?.last().copied() {
            None => Ok(None),
            Some(date) => Ok(Some((date, self.read_universe(date)?))),
        }
    }

    // ── News ────────────────────────────────────────────────────────

    pub fn write_news(
        &self,
        ingestion_date: NaiveDate,
        records: &[RawNewsRecord],
    ) -> Result<PathBuf, StoreError> {
        if records.is_empty() {
            return Err(StoreError::Validation("no news records to write".into()));
        }
        let df = news_to_df(records)?;
        self.write_partition(NEWS, ingestion_date, &df)
    }

    pub fn read_news(&self, ingestion_date: NaiveDate) -> Result<Vec<RawNewsRecord>, StoreError> {
        let path = self.partition_path(NEWS, ingestion_date);
        if !path.exists() {
            return Err(StoreError::MissingPartition {
                dataset: NEWS.into(),
                ingestion_date,
            });
        }
        df_to_news(&read_parquet(&path)?)
    }

    // ── Shared plumbing ─────────────────────────────────────────────

    fn write_partition(
        &self,
        dataset: &str,
        ingestion_date: NaiveDate,
        df: &DataFrame,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.dataset_dir(dataset);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("create {}: {e}", dir.display())))?;

        let path = self.partition_path(dataset, ingestion_date);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(format!("atomic rename failed: {e}"))
        })?;
        Ok(path)
    }

    fn list_partitions(&self, dataset: &str) -> Result<Vec<NaiveDate>, StoreError> {
        let dir = self.dataset_dir(dataset);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&dir).map_err(|e| StoreError::Io(format!("read {}: {e}", dir.display())))?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io(format!("dir entry: {e}")))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name
                .strip_prefix("ingestion_date=")
                .and_then(|s| s.strip_suffix(".parquet"))
            else {
                continue;
            };
            if let Ok(date) = stem.parse::<NaiveDate>() {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}

// ── Parquet I/O ─────────────────────────────────────────────────────

pub(crate) fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let file =
        fs::File::create(path).map_err(|e| StoreError::Io(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StoreError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

pub(crate) fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::Io(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;
    if df.height() == 0 {
        return Err(StoreError::Validation("empty parquet partition".into()));
    }
    Ok(df)
}

// ── Date helpers ────────────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub(crate) fn days_to_date(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn datetime_to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

fn millis_to_datetime(ms: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

// ── Codecs ──────────────────────────────────────────────────────────

fn prices_to_df(records: &[RawPriceRecord]) -> Result<DataFrame, StoreError> {
    let symbols: Vec<String> = records.iter().map(|r| r.symbol.clone()).collect();
    let trade_dates: Vec<i32> = records.iter().map(|r| date_to_days(r.trade_date)).collect();
    let opens: Vec<f64> = records.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = records.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = records.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let adj_closes: Vec<f64> = records.iter().map(|r| r.adj_close).collect();
    let volumes: Vec<u64> = records.iter().map(|r| r.volume).collect();
    let ingestion_dates: Vec<i32> = records
        .iter()
        .map(|r| date_to_days(r.ingestion_date))
        .collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("trade_date".into(), trade_dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("trade_date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("adj_close".into(), adj_closes),
        Column::new("volume".into(), volumes),
        Column::new("ingestion_date".into(), ingestion_dates)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("ingestion_date cast: {e}")))?,
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn df_to_prices(df: &DataFrame) -> Result<Vec<RawPriceRecord>, StoreError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| StoreError::Validation(format!("missing column '{name}': {e}")))
    };
    let typed = |e: PolarsError| StoreError::Parquet(format!("column type: {e}"));

    let symbols = col("symbol")?.str().map_err(typed)?;
    let trade_dates = col("trade_date")?.date().map_err(typed)?;
    let opens = col("open")?.f64().map_err(typed)?;
    let highs = col("high")?.f64().map_err(typed)?;
    let lows = col("low")?.f64().map_err(typed)?;
    let closes = col("close")?.f64().map_err(typed)?;
    let adj_closes = col("adj_close")?.f64().map_err(typed)?;
    let volumes = col("volume")?.u64().map_err(typed)?;
    let ingestion_dates = col("ingestion_date")?.date().map_err(typed)?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let null = |name: &str| StoreError::Validation(format!("null {name} at row {i}"));
        records.push(RawPriceRecord {
            symbol: symbols.get(i).ok_or_else(|| null("symbol"))?.to_string(),
            trade_date: days_to_date(trade_dates.get(i).ok_or_else(|| null("trade_date"))?),
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            adj_close: adj_closes.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(0),
            ingestion_date: days_to_date(
                ingestion_dates.get(i).ok_or_else(|| null("ingestion_date"))?,
            ),
        });
    }
    Ok(records)
}

pub(crate) fn universe_to_df(records: &[UniverseRecord]) -> Result<DataFrame, StoreError> {
    let symbols: Vec<String> = records.iter().map(|r| r.symbol.clone()).collect();
    let names: Vec<String> = records.iter().map(|r| r.company_name.clone()).collect();
    let sectors: Vec<String> = records.iter().map(|r| r.sector.clone()).collect();
    let sub_sectors: Vec<String> = records.iter().map(|r| r.sub_sector.clone()).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("company_name".into(), names),
        Column::new("sector".into(), sectors),
        Column::new("sub_sector".into(), sub_sectors),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

pub(crate) fn df_to_universe(df: &DataFrame) -> Result<Vec<UniverseRecord>, StoreError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| StoreError::Validation(format!("missing column '{name}': {e}")))
    };
    let typed = |e: PolarsError| StoreError::Parquet(format!("column type: {e}"));

    let symbols = col("symbol")?.str().map_err(typed)?;
    let names = col("company_name")?.str().map_err(typed)?;
    let sectors = col("sector")?.str().map_err(typed)?;
    let sub_sectors = col("sub_sector")?.str().map_err(typed)?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        records.push(UniverseRecord {
            symbol: symbols
                .get(i)
                .ok_or_else(|| StoreError::Validation(format!("null symbol at row {i}")))?
                .to_string(),
            company_name: names.get(i).unwrap_or_default().to_string(),
            sector: sectors.get(i).unwrap_or_default().to_string(),
            sub_sector: sub_sectors.get(i).unwrap_or_default().to_string(),
        });
    }
    Ok(records)
}

fn news_to_df(records: &[RawNewsRecord]) -> Result<DataFrame, StoreError> {
    let symbols: Vec<String> = records.iter().map(|r| r.symbol.clone()).collect();
    // Stored as epoch milliseconds; decoded back on read.
    let published: Vec<i64> = records
        .iter()
        .map(|r| datetime_to_millis(r.published_at))
        .collect();
    let headlines: Vec<String> = records.iter().map(|r| r.headline.clone()).collect();
    let snippets: Vec<String> = records.iter().map(|r| r.snippet.clone()).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("published_at_ms".into(), published),
        Column::new("headline".into(), headlines),
        Column::new("snippet".into(), snippets),
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn df_to_news(df: &DataFrame) -> Result<Vec<RawNewsRecord>, StoreError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| StoreError::Validation(format!("missing column '{name}': {e}")))
    };
    let typed = |e: PolarsError| StoreError::Parquet(format!("column type: {e}"));

    let symbols = col("symbol")?.str().map_err(typed)?;
    let published = col("published_at_ms")?.i64().map_err(typed)?;
    let headlines = col("headline")?.str().map_err(typed)?;
    let snippets = col("snippet")?.str().map_err(typed)?;

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let null = |name: &str| StoreError::Validation(format!("null {name} at row {i}"));
        let ms = published.get(i).ok_or_else(|| null("published_at_ms"))?;
        records.push(RawNewsRecord {
            symbol: symbols.get(i).ok_or_else(|| null("symbol"))?.to_string(),
            published_at: millis_to_datetime(ms)
                .ok_or_else(|| StoreError::Validation(format!("bad timestamp {ms} at row {i}")))?,
            headline: headlines.get(i).unwrap_or_default().to_string(),
            snippet: snippets.get(i).unwrap_or_default().to_string(),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_root() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("anomalab_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_prices(ingestion: NaiveDate) -> Vec<RawPriceRecord> {
        vec![
            RawPriceRecord {
                symbol: "SPY".into(),
                trade_date: day(2025, 6, 2),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                adj_close: 101.0,
                volume: 1000,
                ingestion_date: ingestion,
            },
            RawPriceRecord {
                symbol: "SPY".into(),
                trade_date: day(2025, 6, 3),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: 102.0,
                adj_close: 102.0,
                volume: 1100,
                ingestion_date: ingestion,
            },
        ]
    }

    #[test]
    fn price_partition_roundtrip() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let ingestion = day(2025, 6, 4);

        store.write_prices(ingestion, &sample_prices(ingestion)).unwrap();
        let loaded = store.read_prices(ingestion).unwrap();

        assert_eq!(loaded, sample_prices(ingestion));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn rewrite_partition_replaces_it() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let ingestion = day(2025, 6, 4);

        store.write_prices(ingestion, &sample_prices(ingestion)).unwrap();
        let one = &sample_prices(ingestion)[..1];
        store.write_prices(ingestion, one).unwrap();

        assert_eq!(store.read_prices(ingestion).unwrap().len(), 1);
        assert_eq!(store.price_partitions().unwrap(), vec![ingestion]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn empty_batch_rejected() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let err = store.write_prices(day(2025, 6, 4), &[]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn mismatched_ingestion_date_rejected() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let records = sample_prices(day(2025, 6, 4));
        let err = store.write_prices(day(2025, 6, 5), &records).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_partition_is_reported() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let err = store.read_prices(day(2025, 6, 4)).unwrap_err();
        assert!(matches!(err, StoreError::MissingPartition { .. }));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn read_all_prices_spans_partitions_in_order() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let d1 = day(2025, 6, 4);
        let d2 = day(2025, 6, 5);

        store.write_prices(d2, &sample_prices(d2)).unwrap();
        store.write_prices(d1, &sample_prices(d1)).unwrap();

        let all = store.read_all_prices().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].ingestion_date, d1);
        assert_eq!(all[3].ingestion_date, d2);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn corrupt_partition_is_quarantined_not_fatal() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let good = day(2025, 6, 4);
        store.write_prices(good, &sample_prices(good)).unwrap();

        // Plant a corrupt partition alongside the good one.
        let bad_path = root
            .join("bronze")
            .join("prices")
            .join("ingestion_date=2025-06-05.parquet");
        fs::write(&bad_path, b"not parquet").unwrap();

        let all = store.read_all_prices().unwrap();
        assert_eq!(all.len(), 2);
        assert!(!bad_path.exists());
        assert!(bad_path.with_extension("parquet.quarantined").exists());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn universe_roundtrip_and_latest() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let records = vec![UniverseRecord {
            symbol: "AAPL".into(),
            company_name: "Apple Inc".into(),
            sector: "Tech".into(),
            sub_sector: "Hardware".into(),
        }];

        store.write_universe(day(2025, 6, 3), &records).unwrap();
        store.write_universe(day(2025, 6, 4), &records).unwrap();

        let (date, loaded) = store.latest_universe().unwrap().unwrap();
        assert_eq!(date, day(2025, 6, 4));
        assert_eq!(loaded, records);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn latest_universe_empty_store() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        assert!(store.latest_universe().unwrap().is_none());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn news_roundtrip() {
        let root = temp_root();
        let store = BronzeStore::new(&root);
        let records = vec![RawNewsRecord {
            symbol: "AAPL".into(),
            published_at: day(2025, 6, 2).and_hms_opt(14, 30, 0).unwrap(),
            headline: "Apple does a thing".into(),
            snippet: "Markets react.".into(),
        }];

        store.write_news(day(2025, 6, 4), &records).unwrap();
        let loaded = store.read_news(day(2025, 6, 4)).unwrap();
        assert_eq!(loaded, records);
        let _ = fs::remove_dir_all(&root);
    }
}
