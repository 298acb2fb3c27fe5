//! Scan report export — JSON and CSV artifacts plus a terminal preview.

use crate::pipeline::ScanReport;
use anomalab_core::domain::SignalVector;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialize a full scan report to pretty JSON.
pub fn export_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScanReport to JSON")
}

/// Export the ranked rows as CSV. `None` fields become empty cells, keeping
/// "insufficient data" distinct from zero in the artifact.
pub fn export_csv(rows: &[SignalVector]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "run_date",
        "ret_1d",
        "z_ret_1d",
        "rvol_60",
        "is_52w_high",
        "is_52w_low",
        "flag_200d_cross_up",
        "flag_200d_cross_down",
        "event_flag_count",
        "interestingness_score",
    ])?;

    for v in rows {
        wtr.write_record([
            v.symbol.clone(),
            v.run_date.to_string(),
            opt_cell(v.ret_1d),
            opt_cell(v.z_ret_1d),
            opt_cell(v.rvol_60),
            v.is_52w_high.to_string(),
            v.is_52w_low.to_string(),
            v.flag_200d_cross_up.to_string(),
            v.flag_200d_cross_down.to_string(),
            v.event_flag_count.to_string(),
            v.interestingness_score.to_string(),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

fn opt_cell(x: Option<f64>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

/// Write `scan_{run_date}.json` and `.csv` under `dir`; returns both paths.
pub fn save_artifacts(dir: &Path, report: &ScanReport) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let json_path = dir.join(format!("scan_{}.json", report.run_date));
    fs::write(&json_path, export_json(report)?)
        .with_context(|| format!("write {}", json_path.display()))?;

    let csv_path = dir.join(format!("scan_{}.csv", report.run_date));
    fs::write(&csv_path, export_csv(&report.ranked)?)
        .with_context(|| format!("write {}", csv_path.display()))?;

    Ok((json_path, csv_path))
}

/// Human-readable top-N table for the terminal.
pub fn preview(report: &ScanReport, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scan for {} — {} of {} symbols ranked",
        report.run_date,
        report.ranked.len(),
        report.universe_size
    );
    for (i, v) in report.ranked.iter().take(top).enumerate() {
        let z = v
            .z_ret_1d
            .map_or("    -".to_string(), |z| format!("{z:+5.2}"));
        let rvol = v
            .rvol_60
            .map_or("    -".to_string(), |r| format!("{r:5.2}"));
        let _ = writeln!(
            out,
            "{:>3}. {:<6} score={:6.2}  z={z}  rvol={rvol}  flags={}",
            i + 1,
            v.symbol,
            v.interestingness_score,
            v.event_flag_count
        );
    }
    if !report.omitted.is_empty() {
        let _ = writeln!(out, "Omitted {} symbols (fetch failures):", report.omitted.len());
        for (symbol, reason) in &report.omitted {
            let _ = writeln!(out, "  {symbol}: {reason}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn vector(symbol: &str, score: f64, z: Option<f64>) -> SignalVector {
        SignalVector {
            symbol: symbol.into(),
            run_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            ret_1d: Some(0.02),
            z_ret_1d: z,
            rvol_60: Some(1.5),
            is_52w_high: true,
            is_52w_low: false,
            flag_200d_cross_up: false,
            flag_200d_cross_down: false,
            event_flag_count: 1,
            interestingness_score: score,
        }
    }

    fn report(rows: Vec<SignalVector>) -> ScanReport {
        ScanReport {
            run_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            universe_size: 10,
            ranked: rows,
            omitted: vec![("GHOST".into(), "upstream rejected request".into())],
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = export_csv(&[vector("AAA", 3.0, Some(2.5)), vector("BBB", 1.0, None)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol,run_date,ret_1d"));
        assert!(lines[1].starts_with("AAA,2025-06-02,"));
    }

    #[test]
    fn csv_none_becomes_empty_cell() {
        let csv = export_csv(&[vector("BBB", 1.0, None)]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        // ret_1d, then an empty z_ret_1d cell, then rvol.
        assert!(row.contains("0.02,,1.5"));
    }

    #[test]
    fn json_roundtrips() {
        let rep = report(vec![vector("AAA", 3.0, Some(2.5))]);
        let json = export_json(&rep).unwrap();
        let back: ScanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ranked.len(), 1);
        assert_eq!(back.omitted.len(), 1);
    }

    #[test]
    fn preview_lists_top_rows_and_omissions() {
        let rep = report(vec![vector("AAA", 3.0, Some(2.5)), vector("BBB", 1.0, None)]);
        let text = preview(&rep, 1);
        assert!(text.contains("AAA"));
        assert!(!text.contains("BBB")); // beyond top-1
        assert!(text.contains("GHOST"));
    }

    #[test]
    fn artifacts_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let rep = report(vec![vector("AAA", 3.0, Some(2.5))]);
        let (json_path, csv_path) = save_artifacts(dir.path(), &rep).unwrap();
        assert!(json_path.exists());
        assert!(csv_path.exists());
    }
}
