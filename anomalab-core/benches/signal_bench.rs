//! Signal engine throughput over a mid-sized universe.

use anomalab_core::domain::CanonicalPriceRow;
use anomalab_core::signals::{SignalConfig, SignalEngine};
use anomalab_core::store::CanonicalTable;
use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};

fn build_table(symbols: usize, sessions: usize) -> (CanonicalTable, Vec<String>, NaiveDate) {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let mut rows = Vec::with_capacity(symbols * sessions);
    let mut universe = Vec::with_capacity(symbols);

    for s in 0..symbols {
        let symbol = format!("SYM{s:04}");
        universe.push(symbol.clone());
        let mut close = 50.0 + s as f64;
        for i in 0..sessions {
            // Deterministic pseudo-walk; no RNG needed for a benchmark.
            close *= 1.0 + 0.002 * ((i * 7 + s * 13) % 11) as f64 - 0.01;
            let close = close.max(1.0);
            rows.push(CanonicalPriceRow {
                symbol: symbol.clone(),
                trade_date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: (close - 1.0).max(0.5),
                close,
                adj_close: close,
                volume: 1_000 + ((i * 31 + s) % 997) as u64,
            });
        }
    }
    let run_date = base + chrono::Duration::days(sessions as i64 - 1);
    (CanonicalTable::from_rows(rows), universe, run_date)
}

fn bench_compute(c: &mut Criterion) {
    let (table, universe, run_date) = build_table(200, 300);
    let engine = SignalEngine::new(SignalConfig::default()).unwrap();

    c.bench_function("compute_200_symbols_300_sessions", |b| {
        b.iter(|| engine.compute(&table, run_date, &universe, 0.0))
    });
}

criterion_group!(benches, bench_compute);
criterion_main!(benches);
