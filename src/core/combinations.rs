//! Synergistic cause-pair detection
//!
//! Enumerates unordered cause pairs that co-occur in meals and measures
//! whether the pair's joint association with an effect exceeds the
//! stronger of its individual associations by the synergy margin. The
//! contingency machinery matches the window engine: meals containing the
//! pair against meals without it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::stats::{chi_square_2x2, p_from_chi_square};
use super::types::{ConfidenceLevel, FoodCombination, Meal};

/// Excess over the stronger individual rate required to call a pair
/// synergistic
pub const SYNERGY_MARGIN: f64 = 0.15;

/// Default minimum meals containing a pair
pub const DEFAULT_MIN_SAMPLE: usize = 3;

/// Detection parameters
#[derive(Debug, Clone)]
pub struct CombinationParams {
    /// Pairs seen in fewer meals than this are dropped outright
    pub min_sample: usize,
    /// How long after a meal an effect still counts as following it
    pub follow_window: Duration,
}

impl Default for CombinationParams {
    fn default() -> Self {
        Self {
            min_sample: DEFAULT_MIN_SAMPLE,
            follow_window: Duration::hours(24),
        }
    }
}

/// Find synergistic pairs across the given meals
///
/// `individual_rates` maps a cause id to its standalone follow rate;
/// missing entries count as 0. Results come back sorted by synergy,
/// strongest first. Zero meals or effects yield an empty list.
pub fn detect(
    meals: &[Meal],
    effects: &[DateTime<Utc>],
    effect_id: &str,
    individual_rates: &HashMap<String, f64>,
    params: &CombinationParams,
) -> Vec<FoodCombination> {
    if meals.is_empty() || effects.is_empty() {
        return Vec::new();
    }

    // Unique unordered pairs and the meals containing them
    let mut pair_meals: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (idx, meal) in meals.iter().enumerate() {
        let mut items: Vec<&String> = meal.item_ids.iter().collect();
        items.sort();
        items.dedup();

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                pair_meals
                    .entry((items[i].clone(), items[j].clone()))
                    .or_default()
                    .push(idx);
            }
        }
    }

    let followed: Vec<bool> = meals
        .iter()
        .map(|m| is_followed(m, effects, params.follow_window))
        .collect();

    let mut results = Vec::new();
    for ((first, second), indices) in pair_meals {
        // Below the minimum: dropped before any p-value work
        if indices.len() < params.min_sample {
            continue;
        }

        let with_pair = indices.len();
        let with_followed = indices.iter().filter(|&&i| followed[i]).count();
        let without_followed = followed
            .iter()
            .enumerate()
            .filter(|&(i, &f)| f && !indices.contains(&i))
            .count();
        let without_pair = meals.len() - with_pair;

        let combination_rate = with_followed as f64 / with_pair as f64;

        let chi_square = chi_square_2x2(
            with_followed as f64,
            (with_pair - with_followed) as f64,
            without_followed as f64,
            (without_pair - without_followed) as f64,
        );
        let p_value = p_from_chi_square(chi_square);

        let individual_max = individual_rates
            .get(&first)
            .copied()
            .unwrap_or(0.0)
            .max(individual_rates.get(&second).copied().unwrap_or(0.0));

        let confidence = if with_pair >= 10 && p_value < 0.01 {
            ConfidenceLevel::High
        } else if with_pair >= 5 && p_value < 0.05 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        results.push(FoodCombination {
            cause_ids: (first, second),
            effect_id: effect_id.to_string(),
            combination_rate,
            individual_max,
            synergistic: combination_rate > individual_max + SYNERGY_MARGIN,
            p_value,
            confidence,
            sample_size: with_pair,
        });
    }

    results.sort_by(|a, b| {
        b.synergy()
            .partial_cmp(&a.synergy())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Did any effect land inside the follow window after this meal?
fn is_followed(meal: &Meal, effects: &[DateTime<Utc>], follow_window: Duration) -> bool {
    effects
        .iter()
        .any(|&e| e > meal.timestamp && e - meal.timestamp <= follow_window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
    }

    fn meal(day: u32, items: &[&str]) -> Meal {
        Meal {
            timestamp: at(day, 12),
            item_ids: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_pair_always_followed() {
        let meals = vec![
            meal(1, &["cheese", "wine"]),
            meal(3, &["cheese", "wine"]),
            meal(5, &["cheese", "wine"]),
        ];
        let effects = vec![at(1, 15), at(3, 15), at(5, 15)];

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );

        assert_eq!(results.len(), 1);
        let combo = &results[0];
        assert_eq!(combo.cause_ids, ("cheese".to_string(), "wine".to_string()));
        assert_eq!(combo.sample_size, 3);
        assert_eq!(combo.combination_rate, 1.0);
        // No individual rates on file: full rate is all synergy
        assert!(combo.synergistic);
    }

    #[test]
    fn test_rare_pair_excluded() {
        let meals = vec![
            meal(1, &["cheese", "wine"]),
            meal(3, &["cheese", "wine"]),
            meal(5, &["cheese", "bread"]),
        ];
        let effects = vec![at(1, 15), at(3, 15), at(5, 15)];

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );

        // cheese+wine occurs twice, cheese+bread once: both below 3
        assert!(results.is_empty());
    }

    #[test]
    fn test_single_cause_meals_contribute_nothing() {
        let meals = vec![meal(1, &["cheese"]), meal(2, &["wine"]), meal(3, &["cheese"])];
        let effects = vec![at(1, 15), at(2, 15), at(3, 15)];

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_no_meals_or_effects_empty() {
        let meals = vec![meal(1, &["cheese", "wine"])];
        let effects = vec![at(1, 15)];

        assert!(detect(&[], &effects, "e", &HashMap::new(), &CombinationParams::default())
            .is_empty());
        assert!(detect(&meals, &[], "e", &HashMap::new(), &CombinationParams::default())
            .is_empty());
    }

    #[test]
    fn test_not_synergistic_when_individual_explains_it() {
        let meals = vec![
            meal(1, &["cheese", "wine"]),
            meal(3, &["cheese", "wine"]),
            meal(5, &["cheese", "wine"]),
        ];
        let effects = vec![at(1, 15), at(3, 15), at(5, 15)];

        // Cheese alone already reacts 95% of the time
        let mut rates = HashMap::new();
        rates.insert("cheese".to_string(), 0.95);
        rates.insert("wine".to_string(), 0.2);

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &rates,
            &CombinationParams::default(),
        );

        let combo = &results[0];
        assert_eq!(combo.individual_max, 0.95);
        assert!(!combo.synergistic);
    }

    #[test]
    fn test_synergy_margin_boundary() {
        let meals = vec![
            meal(1, &["a", "b"]),
            meal(3, &["a", "b"]),
            meal(5, &["a", "b"]),
            meal(7, &["a", "b"]),
        ];
        // Three of four meals followed: rate 0.75
        let effects = vec![at(1, 15), at(3, 15), at(5, 15)];

        let mut rates = HashMap::new();
        // 0.75 is exactly max + margin: not strictly greater, not synergistic
        rates.insert("a".to_string(), 0.60);

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &rates,
            &CombinationParams::default(),
        );
        assert!((results[0].combination_rate - 0.75).abs() < 1e-12);
        assert!(!results[0].synergistic);
    }

    #[test]
    fn test_duplicate_items_in_meal_no_self_pair() {
        let meals = vec![
            meal(1, &["cheese", "cheese", "wine"]),
            meal(3, &["cheese", "wine"]),
            meal(5, &["wine", "cheese"]),
        ];
        let effects = vec![at(1, 15), at(3, 15), at(5, 15)];

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );

        // One pair, counted once per meal, order-normalized
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sample_size, 3);
    }

    #[test]
    fn test_sorted_by_synergy_descending() {
        let mut meals = Vec::new();
        let mut effects = Vec::new();
        // a+b: followed every time (rate 1.0)
        for d in [1u32, 3, 5] {
            meals.push(meal(d, &["a", "b"]));
            effects.push(at(d, 15));
        }
        // c+d: never followed (rate 0.0)
        for d in [10u32, 12, 14] {
            meals.push(meal(d, &["c", "d"]));
        }

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );

        assert_eq!(results.len(), 2);
        assert!(results[0].synergy() >= results[1].synergy());
        assert_eq!(results[0].cause_ids, ("a".to_string(), "b".to_string()));
    }

    #[test]
    fn test_strong_contrast_gets_confident() {
        let mut meals = Vec::new();
        let mut effects = Vec::new();
        // Pair meals always followed
        for d in 1..=12u32 {
            meals.push(meal(d, &["a", "b"]));
            effects.push(at(d, 15));
        }
        // Plenty of pair-free meals never followed
        for d in 13..=24u32 {
            meals.push(meal(d, &["c", "e"]));
        }

        let results = detect(
            &meals,
            &effects,
            "migraine",
            &HashMap::new(),
            &CombinationParams::default(),
        );

        let ab = results
            .iter()
            .find(|c| c.cause_ids == ("a".to_string(), "b".to_string()))
            .unwrap();
        assert_eq!(ab.sample_size, 12);
        assert!(ab.p_value < 0.01);
        assert_eq!(ab.confidence, ConfidenceLevel::High);
    }
}
