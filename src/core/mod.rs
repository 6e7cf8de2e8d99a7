//! Pure analysis engines
//!
//! Everything in this module is synchronous and side-effect-free over
//! in-memory slices: safe to run concurrently across independent
//! (user, pair) computations. Sparse data degrades to sentinel results,
//! never errors; malformed numeric input is a validation error.

pub mod combinations;
pub mod confidence;
pub mod dose;
pub mod spearman;
pub mod stats;
pub mod treatment;
pub mod types;
pub mod windows;

// Re-export commonly used types
pub use types::{
    standard_windows, CatalogItem, ConfidenceLevel, CorrelationResult, DateRange,
    DoseConfidence, DoseResponsePair, DoseResponseResult, Event, EventKind, EventRef,
    FoodCombination, LaggedCorrelation, Meal, RankCorrelation, RankStrength, TimeWindow,
    TreatmentAlert, TreatmentAlertKind, TreatmentCycle, TreatmentEffectiveness,
    TrendDirection, WindowScore,
};

pub use combinations::{CombinationParams, SYNERGY_MARGIN};
pub use spearman::LAG_OFFSETS_HOURS;
pub use windows::WindowCorrelationEngine;
