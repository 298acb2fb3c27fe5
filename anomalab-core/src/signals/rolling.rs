//! Rolling-window helpers for the signal engine.
//!
//! All helpers operate on plain slices; the engine slices the canonical
//! series so that no value beyond the run date can leak in.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1 denominator). NaN with fewer than two
/// values.
pub fn sample_std(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Median of integer volumes; the mean of the two middle values for even
/// lengths. NaN for an empty slice.
pub fn median(xs: &[u64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    }
}

/// Simple moving average of the `period` values ending at `end` (inclusive).
/// None when fewer than `period` values precede the endpoint.
pub fn sma_ending_at(xs: &[f64], end: usize, period: usize) -> Option<f64> {
    if period == 0 || end >= xs.len() || end + 1 < period {
        return None;
    }
    let window = &xs[end + 1 - period..=end];
    Some(mean(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "actual={actual}, expected={expected}"
        );
    }

    #[test]
    fn mean_basic() {
        assert_approx(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn sample_std_known_value() {
        // Sample std of [2, 4, 4, 4, 5, 5, 7, 9] is sqrt(32/7).
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(sample_std(&xs), (32.0f64 / 7.0).sqrt());
    }

    #[test]
    fn sample_std_degenerate() {
        assert!(sample_std(&[1.0]).is_nan());
        assert_approx(sample_std(&[3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn median_odd_and_even() {
        assert_approx(median(&[5, 1, 3]), 3.0);
        assert_approx(median(&[4, 1, 3, 2]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn sma_window_positions() {
        let xs = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_eq!(sma_ending_at(&xs, 4, 5), Some(12.0));
        assert_eq!(sma_ending_at(&xs, 4, 3), Some(13.0));
        assert_eq!(sma_ending_at(&xs, 1, 3), None); // too little history
        assert_eq!(sma_ending_at(&xs, 9, 2), None); // out of range
        assert_eq!(sma_ending_at(&xs, 0, 1), Some(10.0));
    }
}
