//! Three-factor confidence tiering
//!
//! Sample size, consistency and p-value each map to a tier; the overall
//! confidence is the weakest of the three. A large sample with poor
//! consistency must never read as high confidence.

use crate::error::AnalysisError;

use super::types::ConfidenceLevel;

/// Minimum sample for high confidence
const SAMPLE_HIGH: usize = 5;
/// Minimum sample for medium confidence
const SAMPLE_MEDIUM: usize = 3;
/// Consistency thresholds
const CONSISTENCY_HIGH: f64 = 0.70;
const CONSISTENCY_MEDIUM: f64 = 0.50;
/// P-value thresholds
const P_HIGH: f64 = 0.01;
const P_MEDIUM: f64 = 0.05;

/// Classify overall confidence from the three factors
///
/// Validation failures are programmer errors and propagate; they are
/// never silently corrected.
pub fn classify(
    sample_size: usize,
    consistency: f64,
    p_value: f64,
) -> Result<ConfidenceLevel, AnalysisError> {
    if !consistency.is_finite() || !(0.0..=1.0).contains(&consistency) {
        return Err(AnalysisError::InvalidConsistency(consistency));
    }
    if !p_value.is_finite() || !(0.0..=1.0).contains(&p_value) {
        return Err(AnalysisError::InvalidPValue(p_value));
    }

    let sample_tier = if sample_size >= SAMPLE_HIGH {
        ConfidenceLevel::High
    } else if sample_size >= SAMPLE_MEDIUM {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    let consistency_tier = if consistency >= CONSISTENCY_HIGH {
        ConfidenceLevel::High
    } else if consistency >= CONSISTENCY_MEDIUM {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    let p_tier = if p_value < P_HIGH {
        ConfidenceLevel::High
    } else if p_value < P_MEDIUM {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    Ok(sample_tier.min(consistency_tier).min(p_tier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_factors_high() {
        assert_eq!(
            classify(6, 0.80, 0.009).unwrap(),
            ConfidenceLevel::High
        );
    }

    #[test]
    fn test_sample_dominates() {
        assert_eq!(classify(2, 0.75, 0.009).unwrap(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_p_value_dominates() {
        assert_eq!(classify(6, 0.75, 0.10).unwrap(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_consistency_dominates() {
        assert_eq!(classify(6, 0.60, 0.009).unwrap(), ConfidenceLevel::Medium);
        assert_eq!(classify(6, 0.40, 0.009).unwrap(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_boundaries() {
        // Inclusive lower bounds for high on sample and consistency
        assert_eq!(classify(5, 0.70, 0.009).unwrap(), ConfidenceLevel::High);
        // Exclusive upper bound on p
        assert_eq!(classify(5, 0.70, 0.01).unwrap(), ConfidenceLevel::Medium);
        assert_eq!(classify(3, 0.50, 0.04).unwrap(), ConfidenceLevel::Medium);
        assert_eq!(classify(3, 0.50, 0.05).unwrap(), ConfidenceLevel::Low);
    }

    #[test]
    fn test_invalid_consistency() {
        assert_eq!(
            classify(5, 1.2, 0.01),
            Err(AnalysisError::InvalidConsistency(1.2))
        );
        assert_eq!(
            classify(5, -0.1, 0.01),
            Err(AnalysisError::InvalidConsistency(-0.1))
        );
        assert!(classify(5, f64::NAN, 0.01).is_err());
    }

    #[test]
    fn test_invalid_p_value() {
        assert_eq!(
            classify(5, 0.8, 1.5),
            Err(AnalysisError::InvalidPValue(1.5))
        );
        assert_eq!(
            classify(5, 0.8, -0.2),
            Err(AnalysisError::InvalidPValue(-0.2))
        );
        assert!(classify(5, 0.8, f64::INFINITY).is_err());
    }
}
