//! Small numeric helpers shared by the analysis engines
//!
//! Every ratio in the engines goes through [`safe_ratio`] so that an empty
//! denominator always yields `0.0` and never a NaN that would leak into a
//! report.

/// `numerator / denominator`, or `0.0` when the denominator is not positive
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Count-based variant of [`safe_ratio`]
pub fn count_ratio(numerator: usize, denominator: usize) -> f64 {
    safe_ratio(numerator as f64, denominator as f64)
}

/// Arithmetic mean, `0.0` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n)
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample standard deviation from running sums (divides by n - 1)
///
/// Used for benchmarks aggregated in SQL, where only `COUNT`, `SUM` and the
/// sum of squares are available.
pub fn sample_std_dev_from_sums(count: i64, sum: f64, sum_squares: f64) -> f64 {
    if count < 2 {
        return 0.0;
    }
    let n = count as f64;
    let variance = (sum_squares - sum * sum / n) / (n - 1.0);
    // Rounding in the sums can push a zero variance slightly negative
    variance.max(0.0).sqrt()
}

/// Coefficient of variation (population stdev / mean), `0.0` when the mean is not positive
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    safe_ratio(population_std_dev(values), mean(values))
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(safe_ratio(5.0, -1.0), 0.0);
        assert_eq!(safe_ratio(1.0, 4.0), 0.25);
        assert_eq!(count_ratio(3, 0), 0.0);
    }

    #[test]
    fn test_population_std_dev() {
        // Values 2,4,4,4,5,5,7,9 have population stdev 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&values) - 2.0).abs() < 1e-9);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn test_sample_std_dev_from_sums() {
        // 1,2,3,4,5 -> sample variance 2.5
        let values: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sum: f64 = values.iter().sum();
        let sum_sq: f64 = values.iter().map(|v| v * v).sum();
        let sd = sample_std_dev_from_sums(5, sum, sum_sq);
        assert!((sd - 2.5f64.sqrt()).abs() < 1e-9);
        assert_eq!(sample_std_dev_from_sums(1, 3.0, 9.0), 0.0);
    }

    #[test]
    fn test_cv_of_flat_series_is_zero() {
        assert_eq!(coefficient_of_variation(&[100.0, 100.0, 100.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(86.499999), 86.5);
        assert_eq!(round2(1.0 / 3.0), 0.33);
    }
}
