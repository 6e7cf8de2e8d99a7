//! Dose-response regression
//!
//! Least-squares fit between an ordinal dose proxy (portion size) and
//! outcome severity. Sparse or degenerate input degrades to an
//! insufficient-tier result with a message; nothing here propagates an
//! error outward.

use tracing::warn;

use super::stats::{mean, simple_ols};
use super::types::{DoseConfidence, DoseResponsePair, DoseResponseResult};

/// Minimum pairs before a regression is attempted
const MIN_SAMPLE: usize = 5;
/// Sample floor for the high tier
const HIGH_SAMPLE: usize = 10;
/// R-squared thresholds
const R_SQUARED_HIGH: f64 = 0.7;
const R_SQUARED_LOW: f64 = 0.4;

/// Map a portion label to its ordinal dose
///
/// Unknown labels default to the middle dose with a warning, never an
/// error.
pub fn dose_from_portion(portion: &str) -> f64 {
    match portion.to_ascii_lowercase().as_str() {
        "small" => 1.0,
        "medium" => 2.0,
        "large" => 3.0,
        other => {
            warn!("[DOSE] unknown portion '{}', assuming medium", other);
            2.0
        }
    }
}

/// Fit severity against dose across the observed pairs
pub fn analyze(pairs: &[DoseResponsePair]) -> DoseResponseResult {
    let n = pairs.len();
    if n < MIN_SAMPLE {
        return insufficient(
            pairs,
            format!("not enough dose data: {} pairs, need {}", n, MIN_SAMPLE),
        );
    }

    let doses: Vec<f64> = pairs.iter().map(|p| p.dose).collect();
    let severities: Vec<f64> = pairs.iter().map(|p| p.severity).collect();

    // All-identical doses leave the slope unidentified
    if doses.windows(2).all(|w| w[0] == w[1]) {
        return insufficient(
            pairs,
            "dose has no variation, regression is undefined".to_string(),
        );
    }

    let (intercept, slope) = simple_ols(&doses, &severities);

    let severity_mean = mean(&severities);
    let ss_total: f64 = severities
        .iter()
        .map(|s| (s - severity_mean) * (s - severity_mean))
        .sum();
    let ss_residual: f64 = doses
        .iter()
        .zip(severities.iter())
        .map(|(d, s)| {
            let predicted = intercept + slope * d;
            (s - predicted) * (s - predicted)
        })
        .sum();

    let r_squared = if ss_total > 1e-12 {
        (1.0 - ss_residual / ss_total).clamp(0.0, 1.0)
    } else {
        // Constant severity: the flat fit explains nothing
        0.0
    };

    let confidence = if r_squared >= R_SQUARED_HIGH && n >= HIGH_SAMPLE {
        DoseConfidence::High
    } else if r_squared < R_SQUARED_LOW {
        DoseConfidence::Low
    } else {
        DoseConfidence::Medium
    };

    DoseResponseResult {
        slope,
        intercept,
        r_squared,
        confidence,
        sample_size: n,
        pairs: pairs.to_vec(),
        message: None,
    }
}

fn insufficient(pairs: &[DoseResponsePair], message: String) -> DoseResponseResult {
    DoseResponseResult {
        slope: 0.0,
        intercept: 0.0,
        r_squared: 0.0,
        confidence: DoseConfidence::Insufficient,
        sample_size: pairs.len(),
        pairs: pairs.to_vec(),
        message: Some(message),
    }
}
