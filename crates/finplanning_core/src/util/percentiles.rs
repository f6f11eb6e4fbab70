//! Percentile helpers for Monte Carlo aggregation

/// Sort a sample in place using a total order on `f64`
pub fn sort_values(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}

/// Value at `percentile` (0-100) of an already sorted sample.
///
/// Uses linear interpolation between the two nearest order statistics.
/// Returns 0.0 for an empty sample.
#[must_use]
pub fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let weight = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * weight
        }
    }
}

/// Lower median of an unsorted sample of ages
#[must_use]
pub fn lower_median(values: &[u8]) -> Option<u8> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}
