//! Robust scalar statistics shared by the clipping and solving stages.

/// MAD-to-sigma conversion for a normal distribution.
pub const MAD_TO_SIGMA: f32 = 1.4826;

/// Median of a slice. Reorders `values` in place; O(n) via
/// `select_nth_unstable`.
pub fn median_f32(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return f32::NAN;
    }
    if n == 1 {
        return values[0];
    }
    let mid = n / 2;
    if n % 2 == 1 {
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = values[mid];
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        (lower + upper) / 2.0
    }
}

/// Median of a slice of f64. Reorders `values` in place.
pub fn median_f64(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return values[0];
    }
    let mid = n / 2;
    if n % 2 == 1 {
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = values[mid];
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f64::MIN, f64::max);
        (lower + upper) / 2.0
    }
}

/// MAD-derived robust dispersion: 1.4826 * median(|x - median(x)|).
///
/// Resistant to the bright-source tail that inflates a raw standard
/// deviation. Reorders `values` in place.
pub fn robust_scale_f32(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let med = median_f32(values);
    let mut deviations: Vec<f32> = values.iter().map(|v| (v - med).abs()).collect();
    MAD_TO_SIGMA * median_f32(&mut deviations)
}

/// Mean and population standard deviation.
pub fn mean_stddev_f64(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Population standard deviation about the mean.
pub fn stddev_f64(values: &[f64]) -> f64 {
    mean_stddev_f64(values).1
}
