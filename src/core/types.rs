//! Core type definitions for the analysis engine
//!
//! These types are used throughout the system and represent the
//! fundamental concepts of temporal association analysis: logged events,
//! time windows, and the derived result records handed to consumers.
//!
//! All analytic records here are derived on demand and never user-editable;
//! event records are created by logging actions outside the core.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A food or drink entry, possibly part of a meal
    Food,
    /// An environmental or lifestyle trigger (stress, weather, ...)
    Trigger,
    /// A medication dose
    Medication,
    /// A sleep-quality entry
    Sleep,
    /// A mood entry
    Mood,
    /// A symptom instance, carries a severity
    Symptom,
    /// A flare episode, carries a severity
    Flare,
    /// A treatment being taken (the anchor for effectiveness cycles)
    TreatmentTaken,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Food => "FOOD",
            EventKind::Trigger => "TRIGGER",
            EventKind::Medication => "MEDICATION",
            EventKind::Sleep => "SLEEP",
            EventKind::Mood => "MOOD",
            EventKind::Symptom => "SYMPTOM",
            EventKind::Flare => "FLARE",
            EventKind::TreatmentTaken => "TREATMENT_TAKEN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FOOD" => Some(EventKind::Food),
            "TRIGGER" => Some(EventKind::Trigger),
            "MEDICATION" => Some(EventKind::Medication),
            "SLEEP" => Some(EventKind::Sleep),
            "MOOD" => Some(EventKind::Mood),
            "SYMPTOM" => Some(EventKind::Symptom),
            "FLARE" => Some(EventKind::Flare),
            "TREATMENT_TAKEN" => Some(EventKind::TreatmentTaken),
            _ => None,
        }
    }

    /// Kinds that play the cause role in an association
    pub fn is_cause(&self) -> bool {
        matches!(
            self,
            EventKind::Food
                | EventKind::Trigger
                | EventKind::Medication
                | EventKind::Sleep
                | EventKind::Mood
        )
    }

    /// Kinds that play the effect role in an association
    pub fn is_effect(&self) -> bool {
        matches!(self, EventKind::Symptom | EventKind::Flare)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single logged event, owned by the Event Store
///
/// Immutable from the core's point of view. `severity` is set on
/// symptom/flare entries, `portion` on food entries, `meal_id` groups
/// foods logged together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub item_id: String,
    pub severity: Option<f64>,
    pub portion: Option<String>,
    pub meal_id: Option<String>,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind, item_id: &str) -> Self {
        Self {
            timestamp,
            kind,
            item_id: item_id.to_string(),
            severity: None,
            portion: None,
            meal_id: None,
        }
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_portion(mut self, portion: &str) -> Self {
        self.portion = Some(portion.to_string());
        self
    }

    pub fn with_meal(mut self, meal_id: &str) -> Self {
        self.meal_id = Some(meal_id.to_string());
        self
    }
}

/// A catalog item the user can log against
///
/// Small tagged record with an explicit discriminant instead of an
/// anything-goes attribute bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub category: EventKind,
    pub description: Option<String>,
    pub is_custom: bool,
}

/// Reference to a logged identity: kind plus item id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRef {
    pub kind: EventKind,
    pub id: String,
}

impl EventRef {
    pub fn new(kind: EventKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for EventRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Half-open date range [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days up to and including `end`
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// A named offset range after a cause event
///
/// An effect inside [cause + start, cause + end] counts as associated.
/// Offsets are stored in minutes so the window serializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub label: String,
    pub start_minutes: i64,
    pub end_minutes: i64,
}

impl TimeWindow {
    pub fn new(label: &str, start_minutes: i64, end_minutes: i64) -> Self {
        debug_assert!(start_minutes <= end_minutes);
        Self {
            label: label.to_string(),
            start_minutes,
            end_minutes,
        }
    }

    pub fn start(&self) -> Duration {
        Duration::minutes(self.start_minutes)
    }

    pub fn end(&self) -> Duration {
        Duration::minutes(self.end_minutes)
    }

    /// Does `effect` fall inside this window after `cause`?
    pub fn matches(&self, cause: DateTime<Utc>, effect: DateTime<Utc>) -> bool {
        let offset = effect - cause;
        offset >= self.start() && offset <= self.end()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// The fixed ascending window set scored for every pair
///
/// Windows may overlap; short windows catch fast reactions, the long ones
/// delayed ones.
pub fn standard_windows() -> Vec<TimeWindow> {
    vec![
        TimeWindow::new("15m", 0, 15),
        TimeWindow::new("30m", 0, 30),
        TimeWindow::new("1h", 0, 60),
        TimeWindow::new("2-4h", 120, 240),
        TimeWindow::new("6-12h", 360, 720),
        TimeWindow::new("24h", 0, 1440),
        TimeWindow::new("48h", 0, 2880),
        TimeWindow::new("72h", 0, 4320),
    ]
}

/// Chi-square score for one (pair, window) combination
///
/// `sample_size` is the number of cause events matched to an effect inside
/// this window - it varies per window and breaks best-window ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowScore {
    pub window: TimeWindow,
    pub chi_square: f64,
    pub sample_size: usize,
    pub p_value: f64,
}

/// Tiered confidence, always derived, never a raw input
///
/// Ordered so that `min` across tiers yields the weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "LOW"),
            ConfidenceLevel::Medium => write!(f, "MEDIUM"),
            ConfidenceLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Full association result for one cause/effect pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub cause_id: String,
    pub effect_id: String,
    pub window_scores: Vec<WindowScore>,
    /// Highest-scoring window, ties broken by larger matched sample
    pub best_window: Option<TimeWindow>,
    /// Total cause-event count in the analyzed range
    pub sample_size: usize,
    /// Fraction of cause events followed by the effect in the best window
    pub consistency: f64,
    pub confidence: ConfidenceLevel,
    pub computed_at: DateTime<Utc>,
    pub dose_response: Option<DoseResponseResult>,
}

impl CorrelationResult {
    /// Score of the best window, 0 when no windows were scored
    pub fn best_score(&self) -> f64 {
        self.best_window
            .as_ref()
            .and_then(|w| self.window_scores.iter().find(|s| &s.window == w))
            .map(|s| s.chi_square)
            .unwrap_or(0.0)
    }

    /// P-value of the best window, 1 when no windows were scored
    pub fn best_p_value(&self) -> f64 {
        self.best_window
            .as_ref()
            .and_then(|w| self.window_scores.iter().find(|s| &s.window == w))
            .map(|s| s.p_value)
            .unwrap_or(1.0)
    }
}

/// Strength band for a rank correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankStrength {
    Weak,
    Moderate,
    Strong,
}

impl std::fmt::Display for RankStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankStrength::Weak => write!(f, "WEAK"),
            RankStrength::Moderate => write!(f, "MODERATE"),
            RankStrength::Strong => write!(f, "STRONG"),
        }
    }
}

/// Spearman rank correlation between two aligned series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankCorrelation {
    /// Correlation coefficient in [-1, 1]
    pub rho: f64,
    pub strength: RankStrength,
    pub sample_size: usize,
    pub p_value: f64,
    pub is_significant: bool,
}

/// A rank correlation found at a specific lag offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaggedCorrelation {
    pub lag_hours: i64,
    pub correlation: RankCorrelation,
}

/// A co-occurring cause pair and its joint association with an effect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodCombination {
    /// The pair, ordered lexicographically
    pub cause_ids: (String, String),
    pub effect_id: String,
    /// Fraction of meals containing the pair that were followed by the effect
    pub combination_rate: f64,
    /// Stronger of the two individual cause rates
    pub individual_max: f64,
    pub synergistic: bool,
    pub p_value: f64,
    pub confidence: ConfidenceLevel,
    /// Number of meals containing the pair
    pub sample_size: usize,
}

impl FoodCombination {
    /// Excess of the joint rate over the stronger individual rate
    pub fn synergy(&self) -> f64 {
        self.combination_rate - self.individual_max
    }
}

/// A cause bundle: two or more causes logged together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub timestamp: DateTime<Utc>,
    pub item_ids: Vec<String>,
}

impl Meal {
    pub fn contains_pair(&self, a: &str, b: &str) -> bool {
        self.item_ids.iter().any(|i| i == a) && self.item_ids.iter().any(|i| i == b)
    }
}

/// Confidence tier for a dose-response regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseConfidence {
    Insufficient,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DoseConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoseConfidence::Insufficient => write!(f, "INSUFFICIENT"),
            DoseConfidence::Low => write!(f, "LOW"),
            DoseConfidence::Medium => write!(f, "MEDIUM"),
            DoseConfidence::High => write!(f, "HIGH"),
        }
    }
}

/// One (dose, severity) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseResponsePair {
    pub dose: f64,
    pub severity: f64,
}

/// Linear regression between ordinal dose and outcome severity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseResponseResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub confidence: DoseConfidence,
    pub sample_size: usize,
    pub pairs: Vec<DoseResponsePair>,
    /// Set when the result degraded instead of being computed
    pub message: Option<String>,
}

/// One before/after comparison around a treatment intake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentCycle {
    pub treatment_date: DateTime<Utc>,
    pub baseline_severity: f64,
    pub outcome_severity: f64,
    /// Percent improvement from baseline to outcome
    pub effectiveness: f64,
}

/// Direction of the effectiveness trend across cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Improving => write!(f, "IMPROVING"),
            TrendDirection::Stable => write!(f, "STABLE"),
            TrendDirection::Declining => write!(f, "DECLINING"),
        }
    }
}

/// Aggregate effectiveness of a treatment across its cycles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentEffectiveness {
    pub treatment_id: String,
    /// Mean per-cycle effectiveness, percent
    pub score: f64,
    pub trend: TrendDirection,
    /// Number of usable cycles
    pub sample_size: usize,
    pub confidence: ConfidenceLevel,
    pub cycles: Vec<TreatmentCycle>,
    pub computed_at: DateTime<Utc>,
}

/// Kind of advisory alert raised for a treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreatmentAlertKind {
    /// Score fell more than 20% relative to the previous score
    EffectivenessDrop,
    /// Score below 30
    LowEffectiveness,
    /// Score above 70 but not taken in the last 60 days
    UnusedEffectiveTreatment,
}

impl TreatmentAlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentAlertKind::EffectivenessDrop => "EFFECTIVENESS_DROP",
            TreatmentAlertKind::LowEffectiveness => "LOW_EFFECTIVENESS",
            TreatmentAlertKind::UnusedEffectiveTreatment => "UNUSED_EFFECTIVE_TREATMENT",
        }
    }
}

/// Advisory alert, never blocking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentAlert {
    pub treatment_id: String,
    pub kind: TreatmentAlertKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in [
            EventKind::Food,
            EventKind::Trigger,
            EventKind::Medication,
            EventKind::Sleep,
            EventKind::Mood,
            EventKind::Symptom,
            EventKind::Flare,
            EventKind::TreatmentTaken,
        ] {
            assert_eq!(EventKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_str("BOGUS"), None);
    }

    #[test]
    fn test_event_kind_roles() {
        assert!(EventKind::Food.is_cause());
        assert!(!EventKind::Food.is_effect());
        assert!(EventKind::Flare.is_effect());
        assert!(!EventKind::TreatmentTaken.is_cause());
    }

    #[test]
    fn test_window_matches() {
        let w = TimeWindow::new("2-4h", 120, 240);
        let cause = Utc::now();

        assert!(w.matches(cause, cause + Duration::hours(3)));
        assert!(w.matches(cause, cause + Duration::hours(2)));
        assert!(w.matches(cause, cause + Duration::hours(4)));
        assert!(!w.matches(cause, cause + Duration::hours(1)));
        assert!(!w.matches(cause, cause + Duration::hours(5)));
        assert!(!w.matches(cause, cause - Duration::hours(3)));
    }

    #[test]
    fn test_standard_windows_ascending() {
        let windows = standard_windows();
        assert_eq!(windows.len(), 8);
        for w in &windows {
            assert!(w.start_minutes <= w.end_minutes);
        }
        // End offsets never decrease across the set
        for pair in windows.windows(2) {
            assert!(pair[0].end_minutes <= pair[1].end_minutes);
        }
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
        assert_eq!(
            ConfidenceLevel::High.min(ConfidenceLevel::Low),
            ConfidenceLevel::Low
        );
    }

    #[test]
    fn test_date_range_contains() {
        let end = Utc::now();
        let range = DateRange::trailing_days(end, 30);

        assert!(range.contains(end - Duration::days(10)));
        assert!(range.contains(range.start));
        assert!(!range.contains(end));
        assert!(!range.contains(end - Duration::days(31)));
        assert_eq!(range.num_days(), 30);
    }

    #[test]
    fn test_meal_contains_pair() {
        let meal = Meal {
            timestamp: Utc::now(),
            item_ids: vec!["coffee".into(), "chocolate".into()],
        };
        assert!(meal.contains_pair("coffee", "chocolate"));
        assert!(!meal.contains_pair("coffee", "wine"));
    }
}
