//! Descriptive statistics over case scores and Welch's t-test for variant
//! comparison.

/// Arithmetic mean; 0 for an empty sample
pub fn mean(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    sample.iter().sum::<f64>() / sample.len() as f64
}

/// Population variance (n denominator); 0 for an empty sample
pub fn population_variance(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }

    let m = mean(sample);
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / sample.len() as f64
}

/// Sample variance (n-1 denominator); 0 below two observations
pub fn sample_variance(sample: &[f64]) -> f64 {
    if sample.len() < 2 {
        return 0.0;
    }

    let m = mean(sample);
    let n = sample.len() as f64;
    sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Calculate p-value using Welch's t-test for two independent samples
///
/// Returns `None` if either sample has fewer than 2 elements or both samples
/// have zero variance.
pub fn welch_t_test(sample1: &[f64], sample2: &[f64]) -> Option<f64> {
    if sample1.len() < 2 || sample2.len() < 2 {
        return None;
    }

    let n1 = sample1.len() as f64;
    let n2 = sample2.len() as f64;

    let var1 = sample_variance(sample1);
    let var2 = sample_variance(sample2);

    let se = ((var1 / n1) + (var2 / n2)).sqrt();
    if se == 0.0 {
        return None;
    }

    let t = (mean(sample1) - mean(sample2)) / se;

    // Welch-Satterthwaite degrees of freedom
    let df_num = (var1 / n1 + var2 / n2).powi(2);
    let df_denom = ((var1 / n1).powi(2) / (n1 - 1.0)) + ((var2 / n2).powi(2) / (n2 - 1.0));
    if df_denom == 0.0 {
        return None;
    }

    let df = df_num / df_denom;

    Some(approximate_p_value(t.abs(), df).clamp(0.0, 1.0))
}

/// Two-tailed p-value from a t-statistic, normal approximation with a
/// small-df correction
fn approximate_p_value(t: f64, df: f64) -> f64 {
    if df > 30.0 {
        2.0 * (1.0 - normal_cdf(t))
    } else {
        let correction = 1.0 - 1.0 / (4.0 * df);
        2.0 * (1.0 - normal_cdf(t * correction.sqrt()))
    }
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Abramowitz-Stegun approximation, accurate to about 1.5e-7
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[42.0]), 42.0);
    }

    #[test]
    fn test_population_variance() {
        // [2, 4, 4, 4, 5, 5, 7, 9] has population variance 4
        let var = population_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((var - 4.0).abs() < 1e-9);

        assert_eq!(population_variance(&[]), 0.0);
        assert_eq!(population_variance(&[7.0]), 0.0);
    }

    #[test]
    fn test_sample_variance() {
        let var = sample_variance(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((var - 2.5).abs() < 0.001);
        assert_eq!(sample_variance(&[42.0]), 0.0);
    }

    #[test]
    fn test_welch_t_test_insufficient_samples() {
        assert!(welch_t_test(&[], &[1.0, 2.0]).is_none());
        assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_none());
        assert!(welch_t_test(&[1.0, 2.0], &[1.0]).is_none());
    }

    #[test]
    fn test_welch_t_test_constant_samples() {
        assert!(welch_t_test(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]).is_none());
    }

    #[test]
    fn test_welch_t_test_significantly_different() {
        let a = [6.0, 7.0, 6.0, 8.0, 5.0, 7.0, 6.0, 7.0];
        let b = [8.0, 8.0, 7.0, 9.0, 8.0, 7.0, 8.0, 8.0];

        let p_value = welch_t_test(&a, &b).unwrap();
        assert!(p_value < 0.05, "expected a significant difference, got {}", p_value);
    }

    #[test]
    fn test_welch_t_test_similar_samples() {
        let a = [7.0, 8.0, 6.0, 7.5, 7.0];
        let b = [7.5, 6.5, 7.0, 8.0, 7.0];

        let p_value = welch_t_test(&a, &b).unwrap();
        assert!(p_value > 0.5, "expected no significant difference, got {}", p_value);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 0.001);
        assert!(normal_cdf(3.0) > 0.998);
        assert!(normal_cdf(-3.0) < 0.002);
    }
}
