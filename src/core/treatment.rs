//! Treatment effectiveness over repeated cycles
//!
//! Every intake of a treatment anchors one cycle: mean effect severity in
//! the week before against mean severity in days 7-30 after. Cycles
//! missing either side are dropped. Three usable cycles are the floor for
//! any result at all; fewer is an expected outcome, not an error.
//!
//! The alert rules are stateless and advisory: they read the computed
//! score plus whatever history the caller hands in.

use chrono::{DateTime, Duration, Utc};

use super::stats::mean;
use super::types::{
    ConfidenceLevel, Event, TreatmentAlert, TreatmentAlertKind, TreatmentCycle,
    TreatmentEffectiveness, TrendDirection,
};

/// Days of history forming the baseline before an intake
const BASELINE_DAYS: i64 = 7;
/// Outcome window: days 7 through 30 after the intake
const OUTCOME_START_DAYS: i64 = 7;
const OUTCOME_END_DAYS: i64 = 30;
/// Fewest usable cycles that produce a result
const MIN_CYCLES: usize = 3;
/// Below this many cycles the trend is always stable
const TREND_MIN_CYCLES: usize = 6;
/// Recent-vs-older score difference that moves the trend
const TREND_MARGIN: f64 = 10.0;
/// Relative score drop that raises an alert
const DROP_FRACTION: f64 = 0.20;
/// Score floor below which a treatment reads as not working
const LOW_SCORE: f64 = 30.0;
/// Score above which an unused treatment is worth flagging
const UNUSED_SCORE: f64 = 70.0;
/// Days without an intake before "unused" applies
const UNUSED_DAYS: i64 = 60;

/// Build usable cycles from intake timestamps and effect events
///
/// Effects without a severity are skipped; an intake missing baseline or
/// outcome data contributes no cycle.
pub fn build_cycles(taken: &[DateTime<Utc>], effects: &[Event]) -> Vec<TreatmentCycle> {
    let mut cycles = Vec::new();

    for &t in taken {
        let baseline: Vec<f64> = severities_between(effects, t - Duration::days(BASELINE_DAYS), t);
        let outcome: Vec<f64> = severities_between(
            effects,
            t + Duration::days(OUTCOME_START_DAYS),
            t + Duration::days(OUTCOME_END_DAYS),
        );

        if baseline.is_empty() || outcome.is_empty() {
            continue;
        }

        let baseline_severity = mean(&baseline);
        let outcome_severity = mean(&outcome);
        let effectiveness = if baseline_severity == 0.0 {
            0.0
        } else {
            (baseline_severity - outcome_severity) / baseline_severity * 100.0
        };

        cycles.push(TreatmentCycle {
            treatment_date: t,
            baseline_severity,
            outcome_severity,
            effectiveness,
        });
    }

    cycles.sort_by_key(|c| c.treatment_date);
    cycles
}

fn severities_between(effects: &[Event], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<f64> {
    effects
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp < end)
        .filter_map(|e| e.severity)
        .collect()
}

/// Aggregate effectiveness across cycles
///
/// `None` below three usable cycles.
pub fn analyze(
    treatment_id: &str,
    taken: &[DateTime<Utc>],
    effects: &[Event],
) -> Option<TreatmentEffectiveness> {
    let cycles = build_cycles(taken, effects);
    if cycles.len() < MIN_CYCLES {
        return None;
    }

    let scores: Vec<f64> = cycles.iter().map(|c| c.effectiveness).collect();
    let score = mean(&scores);

    let trend = classify_trend(&scores);

    let confidence = if cycles.len() >= 10 {
        ConfidenceLevel::High
    } else if cycles.len() >= 5 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    Some(TreatmentEffectiveness {
        treatment_id: treatment_id.to_string(),
        score,
        trend,
        sample_size: cycles.len(),
        confidence,
        cycles,
        computed_at: Utc::now(),
    })
}

/// Recent three cycles against everything earlier
fn classify_trend(scores: &[f64]) -> TrendDirection {
    if scores.len() < TREND_MIN_CYCLES {
        return TrendDirection::Stable;
    }

    let split = scores.len() - 3;
    let older = mean(&scores[..split]);
    let recent = mean(&scores[split..]);

    if recent > older + TREND_MARGIN {
        TrendDirection::Improving
    } else if recent < older - TREND_MARGIN {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Evaluate the advisory alert rules for a computed result
///
/// `previous_score` is the last score the caller has on record (the cache
/// is the usual source); `last_taken` the most recent intake of this
/// treatment.
pub fn alerts(
    result: &TreatmentEffectiveness,
    previous_score: Option<f64>,
    last_taken: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Vec<TreatmentAlert> {
    let mut out = Vec::new();

    if let Some(prev) = previous_score {
        if prev > 0.0 && (prev - result.score) / prev > DROP_FRACTION {
            out.push(TreatmentAlert {
                treatment_id: result.treatment_id.clone(),
                kind: TreatmentAlertKind::EffectivenessDrop,
                message: format!(
                    "effectiveness of {} dropped from {:.0} to {:.0}",
                    result.treatment_id, prev, result.score
                ),
            });
        }
    }

    if result.score < LOW_SCORE {
        out.push(TreatmentAlert {
            treatment_id: result.treatment_id.clone(),
            kind: TreatmentAlertKind::LowEffectiveness,
            message: format!(
                "{} is scoring {:.0}, below the useful range",
                result.treatment_id, result.score
            ),
        });
    }

    let unused = match last_taken {
        Some(t) => now - t > Duration::days(UNUSED_DAYS),
        None => true,
    };
    if result.score > UNUSED_SCORE && unused {
        out.push(TreatmentAlert {
            treatment_id: result.treatment_id.clone(),
            kind: TreatmentAlertKind::UnusedEffectiveTreatment,
            message: format!(
                "{} scored {:.0} but has not been taken in over {} days",
                result.treatment_id, result.score, UNUSED_DAYS
            ),
        });
    }

    out
}
