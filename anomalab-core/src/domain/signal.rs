//! Per-symbol signal vector for one run date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Anomaly signals for one (symbol, run_date).
///
/// A `SignalVector` is a pure function of the symbol's canonical price
/// history, the run date, and the signal configuration. It is recomputed on
/// demand and replaced wholesale on the next run, never mutated in place.
///
/// `None` on a numeric field means "insufficient data" and is distinct from
/// "no anomaly" (which would be a value near zero). Boolean flags are `false`
/// both when the condition does not hold and when history is too short to
/// evaluate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVector {
    pub symbol: String,
    pub run_date: NaiveDate,
    /// close(run_date) / close(prior session) - 1. None with < 2 observations.
    pub ret_1d: Option<f64>,
    /// Z-score of `ret_1d` against the trailing return window (run-date
    /// return included). None when the window is short or its std is zero.
    pub z_ret_1d: Option<f64>,
    /// volume(run_date) / median volume of the trailing sessions strictly
    /// before run_date. None when too few prior sessions exist.
    pub rvol_60: Option<f64>,
    pub is_52w_high: bool,
    pub is_52w_low: bool,
    pub flag_200d_cross_up: bool,
    pub flag_200d_cross_down: bool,
    /// Number of true flags among the four above.
    pub event_flag_count: u32,
    /// w_z*|z_ret_1d| + w_rvol*max(0, rvol_60 - 1) + w_flags*event_flag_count.
    /// None components contribute 0 rather than dropping the row.
    pub interestingness_score: f64,
}

impl SignalVector {
    /// The four event flags in a fixed order.
    pub fn flags(&self) -> [bool; 4] {
        [
            self.is_52w_high,
            self.is_52w_low,
            self.flag_200d_cross_up,
            self.flag_200d_cross_down,
        ]
    }
}
