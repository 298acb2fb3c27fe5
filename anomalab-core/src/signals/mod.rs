//! Anomaly signal engine.
//!
//! Turns a symbol's canonical daily series into a signal vector for one run
//! date, and ranks a universe of vectors into a deterministic total order.
//! Every window ends at the run date — rows beyond it never enter a
//! computation.
//!
//! A `SignalVector` is a pure function of (series, run_date, config). The
//! engine keeps no state between runs; callers that want memoization can key
//! a cache on (symbol, run_date, [`SignalConfig::config_hash`]).

pub mod rolling;

use crate::domain::{CanonicalPriceRow, SignalVector};
use crate::store::CanonicalTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;

/// Relative tolerance for close-price equality in the 52-week extreme flags.
/// Guards against representation error, not against "near" highs.
pub const REL_TOLERANCE: f64 = 1e-9;

/// Rejected signal parameters. Reported before any computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalConfigError {
    #[error("z_window must be at least 2")]
    ZWindowTooSmall,

    #[error("rvol_min_sessions must be positive and at most rvol_window")]
    RvolBounds,

    #[error("extreme_window must be positive")]
    ZeroExtremeWindow,

    #[error("ma_short must be positive and smaller than ma_long")]
    MaOrder,
}

/// Signal computation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Trailing daily-return window for the z-score. The run-date return is
    /// included in the window.
    pub z_window: usize,
    /// Sessions strictly before the run date used for the volume median.
    pub rvol_window: usize,
    /// Minimum prior sessions before `rvol_60` is defined.
    pub rvol_min_sessions: usize,
    /// Up-to-this-many sessions (run date inclusive) for 52-week extremes.
    pub extreme_window: usize,
    pub ma_short: usize,
    pub ma_long: usize,
    /// Weight on |z_ret_1d|.
    pub w_z: f64,
    /// Weight on max(0, rvol_60 - 1).
    pub w_rvol: f64,
    /// Weight on event_flag_count.
    pub w_flags: f64,
    /// Default ranking cutoff; callers may override per run.
    pub min_score: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            z_window: 20,
            rvol_window: 60,
            rvol_min_sessions: 20,
            extreme_window: 252,
            ma_short: 50,
            ma_long: 200,
            w_z: 1.0,
            w_rvol: 1.0,
            w_flags: 1.0,
            min_score: 0.0,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if self.z_window < 2 {
            return Err(SignalConfigError::ZWindowTooSmall);
        }
        if self.rvol_min_sessions == 0 || self.rvol_min_sessions > self.rvol_window {
            return Err(SignalConfigError::RvolBounds);
        }
        if self.extreme_window == 0 {
            return Err(SignalConfigError::ZeroExtremeWindow);
        }
        if self.ma_short == 0 || self.ma_short >= self.ma_long {
            return Err(SignalConfigError::MaOrder);
        }
        Ok(())
    }

    /// Deterministic BLAKE3 hash of the configuration, for memoization keys.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("SignalConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// The signal engine: stateless compute over canonical series.
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Result<Self, SignalConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Signal vector for one symbol at `run_date`.
    ///
    /// `series` must be ascending by trade_date (the canonical-table
    /// invariant). Returns None when the symbol did not trade on `run_date`.
    pub fn compute_symbol(
        &self,
        series: &[CanonicalPriceRow],
        run_date: NaiveDate,
    ) -> Option<SignalVector> {
        let idx = series
            .binary_search_by_key(&run_date, |r| r.trade_date)
            .ok()?;
        let rows = &series[..=idx];
        let last = rows.len() - 1;
        let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();

        let ret_1d = daily_return(&closes, last);
        let z_ret_1d = self.z_score(&closes, ret_1d);
        let rvol_60 = self.relative_volume(rows, last);
        let (is_52w_high, is_52w_low) = self.extremes(&closes, last);
        let (flag_200d_cross_up, flag_200d_cross_down) = self.ma_cross(&closes, last);

        let event_flag_count = [
            is_52w_high,
            is_52w_low,
            flag_200d_cross_up,
            flag_200d_cross_down,
        ]
        .iter()
        .filter(|f| **f)
        .count() as u32;

        let cfg = &self.config;
        let interestingness_score = cfg.w_z * z_ret_1d.map_or(0.0, f64::abs)
            + cfg.w_rvol * rvol_60.map_or(0.0, |r| (r - 1.0).max(0.0))
            + cfg.w_flags * event_flag_count as f64;

        Some(SignalVector {
            symbol: rows[last].symbol.clone(),
            run_date,
            ret_1d,
            z_ret_1d,
            rvol_60,
            is_52w_high,
            is_52w_low,
            flag_200d_cross_up,
            flag_200d_cross_down,
            event_flag_count,
            interestingness_score,
        })
    }

    /// Ranked signal vectors for a universe at `run_date`, filtered to
    /// `score >= min_score`.
    ///
    /// The order is total and reproducible: descending score, then
    /// descending |z_ret_1d| (None last), then ascending symbol.
    pub fn compute(
        &self,
        table: &CanonicalTable,
        run_date: NaiveDate,
        universe: &[String],
        min_score: f64,
    ) -> Vec<SignalVector> {
        let symbols: BTreeSet<&str> = universe.iter().map(|s| s.as_str()).collect();
        let mut rows: Vec<SignalVector> = symbols
            .into_iter()
            .filter_map(|symbol| {
                let series = table.series(symbol)?;
                self.compute_symbol(series, run_date)
            })
            .filter(|v| v.interestingness_score >= min_score)
            .collect();
        rows.sort_by(rank_cmp);
        rows
    }

    /// Z-score of the run-date return against the trailing return window.
    fn z_score(&self, closes: &[f64], ret_1d: Option<f64>) -> Option<f64> {
        let ret = ret_1d?;
        let returns = daily_returns(closes);
        if returns.len() < self.config.z_window {
            return None;
        }
        let window = &returns[returns.len() - self.config.z_window..];
        if window.iter().any(|r| !r.is_finite()) {
            return None;
        }
        let std = rolling::sample_std(window);
        if !std.is_finite() || std == 0.0 {
            return None;
        }
        Some((ret - rolling::mean(window)) / std)
    }

    /// Run-date volume over the median volume of the sessions strictly
    /// before the run date.
    fn relative_volume(&self, rows: &[CanonicalPriceRow], last: usize) -> Option<f64> {
        let prior = &rows[..last];
        let window_start = prior.len().saturating_sub(self.config.rvol_window);
        let window = &prior[window_start..];
        if window.len() < self.config.rvol_min_sessions {
            return None;
        }
        let volumes: Vec<u64> = window.iter().map(|r| r.volume).collect();
        let med = rolling::median(&volumes);
        if !med.is_finite() || med <= 0.0 {
            return None;
        }
        Some(rows[last].volume as f64 / med)
    }

    /// 52-week extreme flags over the trailing window, run date inclusive.
    /// Ties with earlier sessions count as extremes.
    fn extremes(&self, closes: &[f64], last: usize) -> (bool, bool) {
        let window_start = (last + 1).saturating_sub(self.config.extreme_window);
        let window = &closes[window_start..=last];
        let max = window.iter().copied().fold(f64::MIN, f64::max);
        let min = window.iter().copied().fold(f64::MAX, f64::min);
        let close = closes[last];
        (rel_eq(close, max), rel_eq(close, min))
    }

    /// Moving-average cross flags between the prior session and the run
    /// date. Both false when history is shorter than `ma_long` + 1 sessions.
    fn ma_cross(&self, closes: &[f64], last: usize) -> (bool, bool) {
        if last < self.config.ma_long {
            return (false, false);
        }
        let cfg = &self.config;
        let (Some(s_prev), Some(l_prev), Some(s_now), Some(l_now)) = (
            rolling::sma_ending_at(closes, last - 1, cfg.ma_short),
            rolling::sma_ending_at(closes, last - 1, cfg.ma_long),
            rolling::sma_ending_at(closes, last, cfg.ma_short),
            rolling::sma_ending_at(closes, last, cfg.ma_long),
        ) else {
            return (false, false);
        };
        let cross_up = s_prev < l_prev && s_now >= l_now;
        let cross_down = s_prev > l_prev && s_now <= l_now;
        (cross_up, cross_down)
    }
}

/// close(last) / close(last - 1) - 1, guarding the degenerate cases.
fn daily_return(closes: &[f64], last: usize) -> Option<f64> {
    if last == 0 {
        return None;
    }
    let prev = closes[last - 1];
    if prev == 0.0 {
        return None;
    }
    let ret = closes[last] / prev - 1.0;
    ret.is_finite().then_some(ret)
}

/// Consecutive daily returns over the whole series; a return over a zero
/// prior close is NaN and poisons any window containing it.
fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] == 0.0 { f64::NAN } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// Equality under a fixed relative tolerance.
fn rel_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

/// Total ranking order: score desc, |z| desc (None last), symbol asc.
fn rank_cmp(a: &SignalVector, b: &SignalVector) -> Ordering {
    let abs_z = |v: &SignalVector| v.z_ret_1d.map_or(f64::NEG_INFINITY, f64::abs);
    b.interestingness_score
        .total_cmp(&a.interestingness_score)
        .then_with(|| abs_z(b).total_cmp(&abs_z(a)))
        .then_with(|| a.symbol.cmp(&b.symbol))
}
