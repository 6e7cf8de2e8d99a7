//! Flaretrack analysis engine
//!
//! Discovers temporal statistical associations between self-logged health
//! events (foods, triggers, medications, sleep, mood) and symptom or flare
//! outcomes, and estimates whether a treatment is working over time.
//!
//! # Shape
//!
//! - Pure engines under [`core`]: window scoring, consistency, confidence
//!   tiering, Spearman rank correlation, dose-response regression,
//!   combination detection and treatment effectiveness.
//! - An [`orchestrator::Orchestrator`] that hydrates events through the
//!   [`data::EventStore`] seam, drives the engines and writes results
//!   through the TTL caches.
//! - A [`scheduler::RecomputeScheduler`] running debounced per-user
//!   background sweeps.
//!
//! This is a library-level computational core: no network surface, no CLI.
//! The application layer logs events, triggers recomputes and renders the
//! result records.

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod orchestrator;
pub mod scheduler;

pub use crate::core::{
    ConfidenceLevel, CorrelationResult, DateRange, DoseConfidence, DoseResponseResult,
    Event, EventKind, EventRef, FoodCombination, LaggedCorrelation, RankCorrelation,
    TreatmentAlert, TreatmentEffectiveness,
};
pub use config::AnalysisConfig;
pub use data::{CacheKey, EventStore, MemoryEventStore, ResultCache, SqliteEventStore};
pub use error::AnalysisError;
pub use orchestrator::{CombinationAnalysis, Orchestrator};
pub use scheduler::RecomputeScheduler;
