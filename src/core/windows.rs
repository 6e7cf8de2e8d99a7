//! Time-windowed association scoring
//!
//! Scores a cause-event stream against an effect-event stream across the
//! fixed window set: one 2x2 contingency table per window, a chi-square
//! statistic, and the banded p-value from the critical-value lookup. The
//! best window is the highest score, ties broken by the larger matched
//! sample.
//!
//! Pure and synchronous; sparse input degrades to zero scores, never an
//! error.

use chrono::{DateTime, Utc};

use super::stats::{chi_square_2x2, p_from_chi_square};
use super::types::{standard_windows, TimeWindow, WindowScore};

/// Scores cause/effect timestamp streams across a window set
pub struct WindowCorrelationEngine {
    windows: Vec<TimeWindow>,
}

impl Default for WindowCorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowCorrelationEngine {
    /// Engine over the standard window set
    pub fn new() -> Self {
        Self {
            windows: standard_windows(),
        }
    }

    /// Engine over a custom window set
    pub fn with_windows(windows: Vec<TimeWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// Score every window for the given streams
    ///
    /// An empty cause list yields all-zero scores with sample 0.
    pub fn score(
        &self,
        causes: &[DateTime<Utc>],
        effects: &[DateTime<Utc>],
    ) -> Vec<WindowScore> {
        self.windows
            .iter()
            .map(|w| score_window(w, causes, effects))
            .collect()
    }

    /// Highest-scoring window, ties broken by larger matched sample
    pub fn best_window<'a>(&self, scores: &'a [WindowScore]) -> Option<&'a WindowScore> {
        scores.iter().reduce(|best, s| {
            if s.chi_square > best.chi_square
                || (s.chi_square == best.chi_square && s.sample_size > best.sample_size)
            {
                s
            } else {
                best
            }
        })
    }
}

/// Score a single window
fn score_window(
    window: &TimeWindow,
    causes: &[DateTime<Utc>],
    effects: &[DateTime<Utc>],
) -> WindowScore {
    let matched = causes
        .iter()
        .filter(|&&c| effects.iter().any(|&e| window.matches(c, e)))
        .count();
    let unmatched_causes = causes.len() - matched;

    // Effects never preceded by a cause inside this window form the
    // "no exposure" row. Its second cell reuses the unmatched-cause count
    // as a stand-in for a true non-exposure denominator.
    let orphan_effects = effects
        .iter()
        .filter(|&&e| !causes.iter().any(|&c| window.matches(c, e)))
        .count();

    let chi_square = chi_square_2x2(
        matched as f64,
        unmatched_causes as f64,
        orphan_effects as f64,
        unmatched_causes as f64,
    );

    WindowScore {
        window: window.clone(),
        chi_square,
        sample_size: matched,
        p_value: p_from_chi_square(chi_square),
    }
}

/// Fraction of cause events followed by at least one effect in the window
///
/// Returns 0 (not an error) when there are no cause events.
pub fn consistency_within(
    causes: &[DateTime<Utc>],
    effects: &[DateTime<Utc>],
    window: &TimeWindow,
) -> f64 {
    if causes.is_empty() {
        return 0.0;
    }
    let matched = causes
        .iter()
        .filter(|&&c| effects.iter().any(|&e| window.matches(c, e)))
        .count();
    matched as f64 / causes.len() as f64
}
