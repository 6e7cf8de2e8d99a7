//! Error taxonomy for the analysis engine
//!
//! Validation errors are raised and propagate unchanged - they indicate a
//! programmer error on the calling side, not bad user data. Sparse data is
//! never an error here: engines return `None` or an insufficient-tier
//! result instead.

use thiserror::Error;

/// Malformed numeric input to one of the pure engines.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// Consistency is a fraction and must stay within [0, 1].
    #[error("consistency must be within [0, 1], got {0}")]
    InvalidConsistency(f64),

    /// P-values outside [0, 1] cannot come from a valid test.
    #[error("p-value must be within [0, 1], got {0}")]
    InvalidPValue(f64),

    /// Paired series must align element-for-element.
    #[error("series length mismatch: {left} vs {right}")]
    SeriesLengthMismatch { left: usize, right: usize },

    /// NaN or infinity where a real measurement was expected.
    #[error("non-finite {what}")]
    NonFinite { what: &'static str },
}
