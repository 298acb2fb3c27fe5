//! Deterministic synthetic price histories for tests and offline runs.
//!
//! Produces a seeded random walk per symbol (the seed is a BLAKE3 hash of
//! the symbol name), skipping weekends. Clearly fake; never mixed with real
//! ingested data in the same bronze partition set.

use anomalab_core::domain::RawPriceRecord;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a synthetic daily history for one symbol over `[start, end]`.
pub fn price_history(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    ingestion_date: NaiveDate,
) -> Vec<RawPriceRecord> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut records = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        records.push(RawPriceRecord {
            symbol: symbol.to_string(),
            trade_date: current,
            open,
            high,
            low,
            close,
            adj_close: close,
            volume,
            ingestion_date,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_symbol_is_deterministic() {
        let a = price_history("SPY", day(2024, 1, 1), day(2024, 1, 31), day(2024, 2, 1));
        let b = price_history("SPY", day(2024, 1, 1), day(2024, 1, 31), day(2024, 2, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn different_symbols_diverge() {
        let spy = price_history("SPY", day(2024, 1, 1), day(2024, 1, 31), day(2024, 2, 1));
        let qqq = price_history("QQQ", day(2024, 1, 1), day(2024, 1, 31), day(2024, 2, 1));
        assert_eq!(spy.len(), qqq.len());
        assert_ne!(spy[0].close, qqq[0].close);
    }

    #[test]
    fn weekends_are_skipped() {
        let records = price_history("SPY", day(2024, 1, 1), day(2024, 1, 14), day(2024, 2, 1));
        assert!(records.iter().all(|r| {
            let wd = r.trade_date.weekday();
            wd != chrono::Weekday::Sat && wd != chrono::Weekday::Sun
        }));
        // Two full weeks: 10 trading days.
        assert_eq!(records.len(), 10);
    }

    #[test]
    fn bars_are_sane() {
        let records = price_history("SPY", day(2024, 1, 1), day(2024, 3, 31), day(2024, 4, 1));
        assert!(records.iter().all(|r| r.is_sane()));
    }
}
