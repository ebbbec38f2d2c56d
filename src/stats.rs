//! Small numeric helpers shared by the scoring model.

/// Population standard deviation (divides by `n`, not `n - 1`).
///
/// Returns 0.0 for empty input.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Geometric mean: the n-th root of the product of `values`.
///
/// Returns 0.0 for empty input. Any zero term makes the result zero.
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let product: f64 = values.iter().product();
    product.powf(1.0 / values.len() as f64)
}

/// Combine two standard deviations computed over independent partitions.
///
/// Uses `sqrt(a² + b²)`, which is exact only for the sum of independent
/// variables. Treat the result as an approximation of the stddev of the
/// combined population.
#[inline]
pub fn combined_std_dev(a: f64, b: f64) -> f64 {
    (a * a + b * b).sqrt()
}
