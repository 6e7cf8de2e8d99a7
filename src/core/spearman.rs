//! Spearman rank correlation
//!
//! Tie-aware ranking, the classic 1 - 6*sum(d^2)/(n*(n^2-1)) coefficient,
//! and an approximate two-tailed p-value from a t statistic pushed through
//! the normal CDF. Used directly on aligned series and, through the lag
//! sweep, for population-level pair discovery over daily aggregates.

use chrono::Duration;

use crate::error::AnalysisError;

use super::stats::normal_cdf;
use super::types::{
    DateRange, Event, LaggedCorrelation, RankCorrelation, RankStrength,
};

/// Lag offsets swept during pair discovery, in hours
pub const LAG_OFFSETS_HOURS: [i64; 5] = [0, 6, 12, 24, 48];

/// Smallest sample a coefficient is defined for
const MIN_SAMPLE: usize = 3;
/// Below this the p-value is untestable and reported as 1
const MIN_TESTABLE_SAMPLE: usize = 10;

/// Assign ascending 1..n ranks, ties averaged
///
/// Two values tied for positions 2 and 3 both receive 2.5.
pub fn rank_data(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j (0-based) share the averaged 1-based rank
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman correlation between two aligned series
///
/// `Ok(None)` when the sample is too small or either series is constant;
/// mismatched lengths are a validation error.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<Option<RankCorrelation>, AnalysisError> {
    if x.len() != y.len() {
        return Err(AnalysisError::SeriesLengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }

    let n = x.len();
    if n < MIN_SAMPLE {
        return Ok(None);
    }
    if is_constant(x) || is_constant(y) {
        return Ok(None);
    }

    let rx = rank_data(x);
    let ry = rank_data(y);

    let d_squared: f64 = rx
        .iter()
        .zip(ry.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum();

    let nf = n as f64;
    let rho = 1.0 - 6.0 * d_squared / (nf * (nf * nf - 1.0));
    // Tie-averaged ranks can push the shortcut formula marginally out of range
    let rho = rho.clamp(-1.0, 1.0);

    let strength = if rho.abs() >= 0.7 {
        RankStrength::Strong
    } else if rho.abs() >= 0.3 {
        RankStrength::Moderate
    } else {
        RankStrength::Weak
    };

    let p_value = approximate_p(rho, n);

    Ok(Some(RankCorrelation {
        rho,
        strength,
        sample_size: n,
        p_value,
        is_significant: p_value < 0.05,
    }))
}

/// Two-tailed p-value for a Spearman coefficient
///
/// Below n=10 the approximation is not usable, so the result is reported
/// as untestable (p=1). A perfect correlation short-circuits before the t
/// statistic blows up.
fn approximate_p(rho: f64, n: usize) -> f64 {
    if n < MIN_TESTABLE_SAMPLE {
        return 1.0;
    }
    if rho.abs() >= 1.0 - 1e-12 {
        return 0.0001;
    }

    let nf = n as f64;
    let t = rho * ((nf - 2.0) / (1.0 - rho * rho)).sqrt();
    let p = 2.0 * normal_cdf(-t.abs());
    p.clamp(0.0, 1.0)
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Mean effect severity per day across the range, shifted back by `lag`
///
/// Days with no effect entries contribute 0: an uneventful day is a real
/// observation, not a gap.
pub fn daily_severity(events: &[Event], range: &DateRange, lag: Duration) -> Vec<f64> {
    let days = range.num_days().max(0) as usize;
    let mut sums = vec![0.0; days];
    let mut counts = vec![0usize; days];

    for event in events {
        let shifted = event.timestamp - lag;
        if !range.contains(shifted) {
            continue;
        }
        let day = (shifted - range.start).num_days() as usize;
        if day < days {
            sums[day] += event.severity.unwrap_or(0.0);
            counts[day] += 1;
        }
    }

    sums.iter()
        .zip(counts.iter())
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect()
}

/// Event count per day across the range
pub fn daily_counts(events: &[Event], range: &DateRange) -> Vec<f64> {
    let days = range.num_days().max(0) as usize;
    let mut counts = vec![0.0; days];

    for event in events {
        if !range.contains(event.timestamp) {
            continue;
        }
        let day = (event.timestamp - range.start).num_days() as usize;
        if day < days {
            counts[day] += 1.0;
        }
    }
    counts
}

/// Sweep the lag offsets and keep the strongest defined correlation
///
/// Aligns daily cause counts against daily effect severity shifted by each
/// lag; `None` when no lag produces a defined coefficient.
pub fn discover_best_lag(
    causes: &[Event],
    effects: &[Event],
    range: &DateRange,
) -> Result<Option<LaggedCorrelation>, AnalysisError> {
    let cause_series = daily_counts(causes, range);
    let mut best: Option<LaggedCorrelation> = None;

    for lag_hours in LAG_OFFSETS_HOURS {
        let effect_series = daily_severity(effects, range, Duration::hours(lag_hours));
        let Some(correlation) = spearman(&cause_series, &effect_series)? else {
            continue;
        };

        let replace = match &best {
            None => true,
            Some(b) => correlation.rho.abs() > b.correlation.rho.abs(),
        };
        if replace {
            best = Some(LaggedCorrelation {
                lag_hours,
                correlation,
            });
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_rank_sum_invariant() {
        for values in [
            vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0],
            vec![1.0, 1.0, 1.0, 1.0],
            vec![2.0, 7.0, 7.0, 7.0, 9.0],
        ] {
            let ranks = rank_data(&values);
            let n = values.len() as f64;
            let sum: f64 = ranks.iter().sum();
            assert!((sum - n * (n + 1.0) / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rank_sum_invariant_random() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        for _ in 0..25 {
            let n = rng.gen_range(3..40);
            // Coarse values force plenty of ties
            let values: Vec<f64> = (0..n).map(|_| rng.gen_range(0..8) as f64).collect();
            let ranks = rank_data(&values);
            let nf = n as f64;
            let sum: f64 = ranks.iter().sum();
            assert!((sum - nf * (nf + 1.0) / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rank_ties_averaged() {
        // 5.0 occupies positions 2 and 3, both get 2.5
        let ranks = rank_data(&[1.0, 5.0, 5.0, 8.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);

        // Three-way tie for positions 1-3 averages to 2
        let ranks = rank_data(&[4.0, 4.0, 4.0, 9.0]);
        assert_eq!(ranks, vec![2.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_perfect_positive() {
        let r = spearman(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0])
            .unwrap()
            .unwrap();
        assert!((r.rho - 1.0).abs() < 1e-9);
        assert_eq!(r.strength, RankStrength::Strong);
    }

    #[test]
    fn test_perfect_negative() {
        let r = spearman(&[1.0, 2.0, 3.0, 4.0, 5.0], &[10.0, 8.0, 6.0, 4.0, 2.0])
            .unwrap()
            .unwrap();
        assert!((r.rho + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_small_sample() {
        assert!(spearman(&[1.0, 2.0], &[2.0, 1.0]).unwrap().is_none());
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = spearman(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, AnalysisError::SeriesLengthMismatch { left: 3, right: 2 });
    }

    #[test]
    fn test_constant_series_undefined() {
        assert!(spearman(&[2.0, 2.0, 2.0, 2.0], &[1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .is_none());
        assert!(spearman(&[1.0, 2.0, 3.0, 4.0], &[7.0, 7.0, 7.0, 7.0])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_small_sample_untestable() {
        let r = spearman(&[1.0, 2.0, 3.0, 4.0, 6.0], &[1.0, 3.0, 2.0, 5.0, 4.0])
            .unwrap()
            .unwrap();
        assert_eq!(r.p_value, 1.0);
        assert!(!r.is_significant);
    }

    #[test]
    fn test_perfect_correlation_significant_at_n10() {
        let x: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 3.0 + 1.0).collect();
        let r = spearman(&x, &y).unwrap().unwrap();
        assert!((r.p_value - 0.0001).abs() < 1e-12);
        assert!(r.is_significant);
    }

    #[test]
    fn test_monotone_noisy_series() {
        let x: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        // Mostly increasing with a couple of swaps
        let mut y = x.clone();
        y.swap(3, 4);
        y.swap(10, 12);
        let r = spearman(&x, &y).unwrap().unwrap();
        assert!(r.rho > 0.9);
        assert!(r.is_significant);
    }

    fn day(d: u32, h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_counts_and_severity() {
        let range = DateRange::new(day(1, 0), day(8, 0));
        let causes = vec![
            Event::new(day(1, 9), EventKind::Food, "coffee"),
            Event::new(day(1, 18), EventKind::Food, "coffee"),
            Event::new(day(3, 12), EventKind::Food, "coffee"),
        ];
        let counts = daily_counts(&causes, &range);
        assert_eq!(counts.len(), 7);
        assert_eq!(counts[0], 2.0);
        assert_eq!(counts[1], 0.0);
        assert_eq!(counts[2], 1.0);

        let effects = vec![
            Event::new(day(1, 10), EventKind::Symptom, "headache").with_severity(4.0),
            Event::new(day(1, 20), EventKind::Symptom, "headache").with_severity(8.0),
        ];
        let severity = daily_severity(&effects, &range, Duration::hours(0));
        assert_eq!(severity[0], 6.0);
        assert_eq!(severity[1], 0.0);
    }

    #[test]
    fn test_lag_shifts_effects_back() {
        let range = DateRange::new(day(1, 0), day(4, 0));
        // Effect at day 2, 04:00; a 6h lag books it against day 1
        let effects =
            vec![Event::new(day(2, 4), EventKind::Symptom, "bloating").with_severity(5.0)];

        let unshifted = daily_severity(&effects, &range, Duration::hours(0));
        assert_eq!(unshifted, vec![0.0, 5.0, 0.0]);

        let shifted = daily_severity(&effects, &range, Duration::hours(6));
        assert_eq!(shifted, vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_discover_best_lag_finds_delayed_pattern() {
        let range = DateRange::new(day(1, 0), day(15, 0));
        let mut causes = Vec::new();
        let mut effects = Vec::new();

        // Cause count ramps up across days; severity follows next morning,
        // which the 24h lag aligns best
        for d in 0..14u32 {
            for _ in 0..(d % 5) {
                causes.push(Event::new(day(1 + d, 12), EventKind::Food, "wine"));
            }
            if d % 5 > 0 {
                effects.push(
                    Event::new(day(2 + d, 6), EventKind::Symptom, "migraine")
                        .with_severity(d as f64 % 5.0),
                );
            }
        }

        let best = discover_best_lag(&causes, &effects, &range).unwrap().unwrap();
        assert!(LAG_OFFSETS_HOURS.contains(&best.lag_hours));
        assert!(best.correlation.rho > 0.5);
    }
}
