//! Shared statistical primitives
//!
//! Hand-rolled numeric routines used by the window, combination and rank
//! engines: 2x2 chi-square, the fixed critical-value p lookup, an error
//! function series for the normal CDF, and simple least squares.

/// Fixed chi-square critical values for df=1, most significant first.
///
/// The lookup trades exactness for a stable monotonic severity ordering;
/// the confidence tiers rely on that ordering.
const CHI_SQUARE_CRITICAL: [(f64, f64); 5] = [
    (10.828, 0.001),
    (6.635, 0.01),
    (3.841, 0.05),
    (2.706, 0.10),
    (1.0, 0.20),
];

/// P-value band for a chi-square statistic at df=1
pub fn p_from_chi_square(chi_square: f64) -> f64 {
    for (critical, p) in CHI_SQUARE_CRITICAL {
        if chi_square >= critical {
            return p;
        }
    }
    0.30
}

/// Chi-square statistic for a 2x2 contingency table
///
/// Cells are [[a, b], [c, d]]. Terms whose expected count is zero are
/// excluded from the sum so degenerate tables score 0 instead of dividing
/// by zero.
pub fn chi_square_2x2(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let total = a + b + c + d;
    if total <= 0.0 {
        return 0.0;
    }

    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let col2 = b + d;

    let observed = [a, b, c, d];
    let expected = [
        row1 * col1 / total,
        row1 * col2 / total,
        row2 * col1 / total,
        row2 * col2 / total,
    ];

    let mut chi = 0.0;
    for i in 0..4 {
        if expected[i] > 0.0 {
            let diff = observed[i] - expected[i];
            chi += diff * diff / expected[i];
        }
    }
    chi
}

/// Error function approximation (Abramowitz and Stegun)
pub fn erf(x: f64) -> f64 {
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

/// Standard normal CDF approximation
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Simple OLS regression y = intercept + slope * x
///
/// Returns (intercept, slope); a zero-variance x yields a flat line
/// through the mean.
pub fn simple_ols(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len().min(y.len()) as f64;
    if n < 2.0 {
        return (0.0, 0.0);
    }

    let x_mean: f64 = x.iter().sum::<f64>() / n;
    let y_mean: f64 = y.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;

    for i in 0..n as usize {
        let x_diff = x[i] - x_mean;
        num += x_diff * (y[i] - y_mean);
        den += x_diff * x_diff;
    }

    if den.abs() < 1e-10 {
        return (y_mean, 0.0);
    }

    let slope = num / den;
    let intercept = y_mean - slope * x_mean;

    (intercept, slope)
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, 0 for fewer than two values
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}
