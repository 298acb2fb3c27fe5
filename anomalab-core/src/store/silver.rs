//! Silver tables — canonical, deduplicated views rebuilt from bronze.
//!
//! The canonical price table holds exactly one row per (symbol, trade_date):
//! when the same key appears under several ingestion dates, the latest
//! ingestion wins. Rebuilds are pure recomputation over every bronze
//! partition, so rerunning one is always safe.

use super::bronze::{
    date_to_days, days_to_date, read_parquet, universe_to_df, write_parquet, BronzeStore,
    StoreError,
};
use crate::domain::{CanonicalPriceRow, RawPriceRecord, UniverseRecord};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// In-memory canonical price table: per-symbol series, ascending trade_date.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    series: BTreeMap<String, Vec<CanonicalPriceRow>>,
    row_count: usize,
}

impl CanonicalTable {
    /// Group already-deduplicated rows into per-symbol ascending series.
    pub fn from_rows(mut rows: Vec<CanonicalPriceRow>) -> Self {
        rows.sort_by(|a, b| (&a.symbol, a.trade_date).cmp(&(&b.symbol, b.trade_date)));
        let row_count = rows.len();
        let mut series: BTreeMap<String, Vec<CanonicalPriceRow>> = BTreeMap::new();
        for row in rows {
            series.entry(row.symbol.clone()).or_default().push(row);
        }
        Self { series, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|s| s.as_str())
    }

    /// Ascending series for one symbol.
    pub fn series(&self, symbol: &str) -> Option<&[CanonicalPriceRow]> {
        self.series.get(symbol).map(|v| v.as_slice())
    }

    /// Rows for one symbol with trade_date in `[start, end]`, ascending.
    /// Empty for unknown symbols or ranges the series does not touch.
    pub fn series_between(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> &[CanonicalPriceRow] {
        let Some(rows) = self.series.get(symbol) else {
            return &[];
        };
        let lo = rows.partition_point(|r| r.trade_date < start);
        let hi = rows.partition_point(|r| r.trade_date <= end);
        &rows[lo..hi]
    }

    /// All rows in (symbol, trade_date) order.
    pub fn rows(&self) -> impl Iterator<Item = &CanonicalPriceRow> {
        self.series.values().flatten()
    }

    /// Latest trade date across all symbols (the default run date).
    pub fn latest_trade_date(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|rows| rows.last().map(|r| r.trade_date))
            .max()
    }

    /// Deterministic BLAKE3 hash over all rows in sorted-symbol order.
    ///
    /// Two rebuilds over identical bronze input produce identical hashes.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (symbol, rows) in &self.series {
            hasher.update(symbol.as_bytes());
            for row in rows {
                hasher.update(row.trade_date.to_string().as_bytes());
                hasher.update(&row.open.to_le_bytes());
                hasher.update(&row.high.to_le_bytes());
                hasher.update(&row.low.to_le_bytes());
                hasher.update(&row.close.to_le_bytes());
                hasher.update(&row.adj_close.to_le_bytes());
                hasher.update(&row.volume.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Deduplicate raw records by (symbol, trade_date); latest ingestion wins.
///
/// Records from equal ingestion dates are interchangeable by the immutability
/// contract; the last one read is kept.
pub fn dedupe_latest_wins(records: Vec<RawPriceRecord>) -> CanonicalTable {
    let mut latest: BTreeMap<(String, NaiveDate), RawPriceRecord> = BTreeMap::new();
    for record in records {
        let key = (record.symbol.clone(), record.trade_date);
        match latest.get(&key) {
            Some(existing) if existing.ingestion_date > record.ingestion_date => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }
    CanonicalTable::from_rows(
        latest
            .into_values()
            .map(CanonicalPriceRow::from_raw)
            .collect(),
    )
}

/// Rebuilds and materializes the silver tables under `{root}/silver/`.
pub struct CanonicalBuilder {
    root: PathBuf,
}

impl CanonicalBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn silver_dir(&self) -> PathBuf {
        self.root.join("silver")
    }

    fn price_path(&self) -> PathBuf {
        self.silver_dir().join("price_daily.parquet")
    }

    fn universe_path(&self) -> PathBuf {
        self.silver_dir().join("universe.parquet")
    }

    /// Rebuild the canonical price table from every bronze price partition
    /// and materialize it. Idempotent; returns the rebuilt table.
    pub fn rebuild(&self, bronze: &BronzeStore) -> Result<CanonicalTable, StoreError> {
        let raw = bronze.read_all_prices()?;
        let table = dedupe_latest_wins(raw);
        if !table.is_empty() {
            self.materialize_prices(&table)?;
        }
        Ok(table)
    }

    /// Rebuild the canonical universe from the latest bronze universe
    /// partition: one row per symbol, sorted. Empty when nothing was
    /// ingested yet.
    pub fn rebuild_universe(&self, bronze: &BronzeStore) -> Result<Vec<UniverseRecord>, StoreError> {
        let Some((_, records)) = bronze.latest_universe()? else {
            return Ok(Vec::new());
        };
        let mut by_symbol: BTreeMap<String, UniverseRecord> = BTreeMap::new();
        for record in records {
            by_symbol.insert(record.symbol.clone(), record);
        }
        let rows: Vec<UniverseRecord> = by_symbol.into_values().collect();
        if !rows.is_empty() {
            let df = universe_to_df(&rows)?;
            write_atomic(&df, &self.universe_path())?;
        }
        Ok(rows)
    }

    /// Load the materialized canonical price table back from disk.
    pub fn load(&self) -> Result<CanonicalTable, StoreError> {
        let df = read_parquet(&self.price_path())?;
        Ok(CanonicalTable::from_rows(df_to_rows(&df)?))
    }

    fn materialize_prices(&self, table: &CanonicalTable) -> Result<(), StoreError> {
        let df = rows_to_df(table)?;
        write_atomic(&df, &self.price_path())
    }
}

fn write_atomic(df: &DataFrame, path: &Path) -> Result<(), StoreError> {
    let dir = path.parent().expect("silver paths have a parent");
    fs::create_dir_all(dir).map_err(|e| StoreError::Io(format!("create {}: {e}", dir.display())))?;
    let tmp_path = path.with_extension("parquet.tmp");
    write_parquet(df, &tmp_path)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(format!("atomic rename failed: {e}"))
    })
}

fn rows_to_df(table: &CanonicalTable) -> Result<DataFrame, StoreError> {
    let rows: Vec<&CanonicalPriceRow> = table.rows().collect();
    let symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    let trade_dates: Vec<i32> = rows.iter().map(|r| date_to_days(r.trade_date)).collect();
    let opens: Vec<f64> = rows.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = rows.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = rows.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let adj_closes: Vec<f64> = rows.iter().map(|r| r.adj_close).collect();
    let volumes: Vec<u64> = rows.iter().map(|r| r.volume).collect();

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
    ])
    .map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

fn df_to_rows(df: &DataFrame) -> Result<Vec<CanonicalPriceRow>, StoreError> {
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

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let null = |name: &str| StoreError::Validation(format!("null {name} at row {i}"));
        rows.push(CanonicalPriceRow {
            symbol: symbols.get(i).ok_or_else(|| null("symbol"))?.to_string(),
            trade_date: days_to_date(trade_dates.get(i).ok_or_else(|| null("trade_date"))?),
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            adj_close: adj_closes.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(0),
        });
    }
    Ok(rows)
}
