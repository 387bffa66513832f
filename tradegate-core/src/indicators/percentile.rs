//! Percentile rank of the latest value within its own history.

/// Percentile (0-100) of the last value among all defined values of `series`.
///
/// Ties take the average rank. Returns NaN when the last value is undefined.
pub fn percentile_rank(series: &[f64]) -> f64 {
    let Some(&last) = series.last() else {
        return f64::NAN;
    };
    if last.is_nan() {
        return f64::NAN;
    }

    let mut below = 0usize;
    let mut equal = 0usize;
    let mut count = 0usize;
    for &v in series.iter().filter(|v| !v.is_nan()) {
        count += 1;
        if v < last {
            below += 1;
        } else if v == last {
            equal += 1;
        }
    }

    let avg_rank = below as f64 + (equal as f64 + 1.0) / 2.0;
    avg_rank / count as f64 * 100.0
}
