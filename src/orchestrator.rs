//! Analysis orchestration
//!
//! Hydrates events from the Event Store, drives the pure engines, merges
//! their results and writes through the caches. The orchestrator owns no
//! statistical logic of its own; it decides what to feed the engines and
//! what to keep.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::core::combinations::{self, CombinationParams};
use crate::core::confidence;
use crate::core::dose;
use crate::core::spearman;
use crate::core::treatment;
use crate::core::types::{
    CorrelationResult, DateRange, DoseResponsePair, Event, EventKind, EventRef,
    FoodCombination, LaggedCorrelation, Meal, TreatmentAlert, TreatmentEffectiveness,
};
use crate::core::windows::{consistency_within, WindowCorrelationEngine};
use crate::data::cache::{CacheKey, ResultCache};
use crate::data::store::EventStore;

/// Individual correlations plus the pair-wise combinations built on them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationAnalysis {
    pub individual: Vec<CorrelationResult>,
    pub combinations: Vec<FoodCombination>,
}

/// Drives the engines over hydrated events
pub struct Orchestrator {
    store: Arc<dyn EventStore>,
    engine: WindowCorrelationEngine,
    config: AnalysisConfig,
    correlation_cache: ResultCache<CorrelationResult>,
    rank_cache: ResultCache<LaggedCorrelation>,
    treatment_cache: ResultCache<TreatmentEffectiveness>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn EventStore>, config: AnalysisConfig) -> Self {
        let ttl = config.cache.ttl();
        Self {
            store,
            engine: WindowCorrelationEngine::new(),
            config,
            correlation_cache: ResultCache::with_ttl(ttl),
            rank_cache: ResultCache::with_ttl(ttl),
            treatment_cache: ResultCache::with_ttl(ttl),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn correlation_cache(&self) -> &ResultCache<CorrelationResult> {
        &self.correlation_cache
    }

    pub fn rank_cache(&self) -> &ResultCache<LaggedCorrelation> {
        &self.rank_cache
    }

    /// Windowed association for one cause/effect pair
    ///
    /// Attaches a dose-response regression when any cause event carries
    /// portion data. The caller decides whether to cache.
    pub async fn compute_correlation(
        &self,
        user_id: &str,
        cause: &EventRef,
        effect: &EventRef,
        range: &DateRange,
    ) -> Result<CorrelationResult> {
        let causes = self
            .store
            .events(user_id, cause.kind, Some(&cause.id), range)
            .await?;
        let effects = self
            .store
            .events(user_id, effect.kind, Some(&effect.id), range)
            .await?;

        let mut result = self.correlate(&cause.id, &effect.id, &causes, &effects)?;

        if causes.iter().any(|c| c.portion.is_some()) {
            if let Some(best) = result.best_window.clone() {
                let pairs = dose_pairs(&causes, &effects, &best);
                result.dose_response = Some(dose::analyze(&pairs));
            }
        }

        debug!(
            "[ANALYZE] {} -> {} for {}: n={} consistency={:.2} confidence={}",
            cause.id, effect.id, user_id, result.sample_size, result.consistency,
            result.confidence
        );
        Ok(result)
    }

    /// Scoring path shared by the single-pair and combination flows
    fn correlate(
        &self,
        cause_id: &str,
        effect_id: &str,
        causes: &[Event],
        effects: &[Event],
    ) -> Result<CorrelationResult> {
        let cause_times: Vec<DateTime<Utc>> = causes.iter().map(|e| e.timestamp).collect();
        let effect_times: Vec<DateTime<Utc>> = effects.iter().map(|e| e.timestamp).collect();

        let window_scores = self.engine.score(&cause_times, &effect_times);
        let best = self.engine.best_window(&window_scores).cloned();

        let consistency = best
            .as_ref()
            .map(|b| consistency_within(&cause_times, &effect_times, &b.window))
            .unwrap_or(0.0);
        let p_value = best.as_ref().map(|b| b.p_value).unwrap_or(1.0);

        let confidence = confidence::classify(cause_times.len(), consistency, p_value)?;

        Ok(CorrelationResult {
            cause_id: cause_id.to_string(),
            effect_id: effect_id.to_string(),
            best_window: best.map(|b| b.window),
            window_scores,
            sample_size: cause_times.len(),
            consistency,
            confidence,
            computed_at: Utc::now(),
            dose_response: None,
        })
    }

    /// Compute one pair and write it through the correlation cache
    pub async fn compute_and_cache(
        &self,
        user_id: &str,
        cause: &EventRef,
        effect: &EventRef,
        range: &DateRange,
    ) -> Result<CorrelationResult> {
        let result = self.compute_correlation(user_id, cause, effect, range).await?;
        let key = CacheKey::new(user_id, &cause.id, &effect.id)
            .with_params(&format!("range:{}d", range.num_days()));
        self.correlation_cache.set(key, result.clone());
        Ok(result)
    }

    /// Lag sweep of the daily-aggregated pair, written through the rank
    /// cache when a coefficient is defined
    pub async fn discover_rank_correlation(
        &self,
        user_id: &str,
        cause: &EventRef,
        effect: &EventRef,
        range: &DateRange,
    ) -> Result<Option<LaggedCorrelation>> {
        let causes = self
            .store
            .events(user_id, cause.kind, Some(&cause.id), range)
            .await?;
        let effects = self
            .store
            .events(user_id, effect.kind, Some(&effect.id), range)
            .await?;

        let best = spearman::discover_best_lag(&causes, &effects, range)?;
        if let Some(found) = &best {
            let key = CacheKey::new(user_id, &cause.id, &effect.id)
                .with_params(&format!("lag-sweep|range:{}d", range.num_days()));
            self.rank_cache.set(key, found.clone());
        }
        Ok(best)
    }

    /// Individual correlations for every co-occurring food plus the
    /// synergistic pair analysis built from them
    pub async fn compute_with_combinations(
        &self,
        user_id: &str,
        effect: &EventRef,
        range: &DateRange,
    ) -> Result<CombinationAnalysis> {
        let foods = self
            .store
            .events(user_id, EventKind::Food, None, range)
            .await?;
        let effects = self
            .store
            .events(user_id, effect.kind, Some(&effect.id), range)
            .await?;
        let effect_times: Vec<DateTime<Utc>> = effects.iter().map(|e| e.timestamp).collect();

        let meals = group_meals(&foods, self.config.meals.group_gap());

        let follow = crate::core::types::TimeWindow::new(
            "follow",
            0,
            self.config.meals.follow_window_hours * 60,
        );

        let food_ids: BTreeSet<&str> = foods.iter().map(|e| e.item_id.as_str()).collect();
        let mut individual = Vec::new();
        let mut rates: HashMap<String, f64> = HashMap::new();

        for id in food_ids {
            let own: Vec<Event> = foods.iter().filter(|e| e.item_id == id).cloned().collect();
            let own_times: Vec<DateTime<Utc>> = own.iter().map(|e| e.timestamp).collect();
            rates.insert(
                id.to_string(),
                consistency_within(&own_times, &effect_times, &follow),
            );
            individual.push(self.correlate(id, &effect.id, &own, &effects)?);
        }

        let params = CombinationParams {
            min_sample: self.config.meals.min_pair_sample,
            follow_window: self.config.meals.follow_window(),
        };
        let combinations =
            combinations::detect(&meals, &effect_times, &effect.id, &rates, &params);

        info!(
            "[ANALYZE] combination sweep for {}: {} foods, {} meals, {} pairs",
            user_id,
            individual.len(),
            meals.len(),
            combinations.len()
        );

        Ok(CombinationAnalysis {
            individual,
            combinations,
        })
    }

    /// Treatment effectiveness with advisory alerts
    ///
    /// The previous cached score feeds the drop rule; the fresh result
    /// replaces it. `None` with fewer than three usable cycles.
    pub async fn treatment_effectiveness(
        &self,
        user_id: &str,
        treatment_id: &str,
        effect: &EventRef,
        range: &DateRange,
    ) -> Result<Option<(TreatmentEffectiveness, Vec<TreatmentAlert>)>> {
        let taken = self
            .store
            .events(user_id, EventKind::TreatmentTaken, Some(treatment_id), range)
            .await?;
        let effects = self
            .store
            .events(user_id, effect.kind, Some(&effect.id), range)
            .await?;

        let taken_times: Vec<DateTime<Utc>> = taken.iter().map(|e| e.timestamp).collect();
        let Some(result) = treatment::analyze(treatment_id, &taken_times, &effects) else {
            debug!(
                "[TREATMENT] {} for {}: not enough usable cycles",
                treatment_id, user_id
            );
            return Ok(None);
        };

        let key = CacheKey::new(user_id, treatment_id, &effect.id);
        let previous_score = self.treatment_cache.get(&key).map(|r| r.score);
        let alerts = treatment::alerts(
            &result,
            previous_score,
            taken_times.last().copied(),
            Utc::now(),
        );
        self.treatment_cache.set(key, result.clone());

        Ok(Some((result, alerts)))
    }

    /// Distinct cause/effect pairs with any activity inside the range
    pub async fn active_pairs(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<(EventRef, EventRef)>> {
        let mut causes: Vec<EventRef> = Vec::new();
        for kind in [EventKind::Food, EventKind::Trigger, EventKind::Medication] {
            let events = self.store.events(user_id, kind, None, range).await?;
            let ids: BTreeSet<&str> = events.iter().map(|e| e.item_id.as_str()).collect();
            causes.extend(ids.into_iter().map(|id| EventRef::new(kind, id)));
        }

        let mut effects: Vec<EventRef> = Vec::new();
        for kind in [EventKind::Symptom, EventKind::Flare] {
            let events = self.store.events(user_id, kind, None, range).await?;
            let ids: BTreeSet<&str> = events.iter().map(|e| e.item_id.as_str()).collect();
            effects.extend(ids.into_iter().map(|id| EventRef::new(kind, id)));
        }

        let mut pairs = Vec::with_capacity(causes.len() * effects.len());
        for cause in &causes {
            for effect in &effects {
                pairs.push((cause.clone(), effect.clone()));
            }
        }
        Ok(pairs)
    }

    /// Invalidate cached results referencing a freshly logged event
    ///
    /// Called by the application whenever the user logs something; bounds
    /// staleness by time-until-next-request instead of the full TTL.
    pub fn invalidate_for_event(&self, user_id: &str, event: &Event) {
        let mut evicted = 0;
        if event.kind.is_cause() {
            evicted += self
                .correlation_cache
                .invalidate_by_cause(user_id, &event.item_id);
            evicted += self.rank_cache.invalidate_by_cause(user_id, &event.item_id);
        }
        if event.kind.is_effect() {
            evicted += self
                .correlation_cache
                .invalidate_by_effect(user_id, &event.item_id);
            evicted += self.rank_cache.invalidate_by_effect(user_id, &event.item_id);
            evicted += self
                .treatment_cache
                .invalidate_by_effect(user_id, &event.item_id);
        }
        if event.kind == EventKind::TreatmentTaken {
            evicted += self
                .treatment_cache
                .invalidate_by_cause(user_id, &event.item_id);
        }
        if evicted > 0 {
            debug!(
                "[CACHE] {} entries invalidated by new {} event for {}",
                evicted, event.kind, user_id
            );
        }
    }
}

/// Bundle food events into meals
///
/// Events sharing a logged meal id form one meal; the rest are chained by
/// time proximity, a new bundle starting whenever the gap to the previous
/// entry exceeds `gap`.
pub fn group_meals(foods: &[Event], gap: Duration) -> Vec<Meal> {
    let mut by_meal_id: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
    let mut loose: Vec<&Event> = Vec::new();

    for event in foods {
        match &event.meal_id {
            Some(id) => by_meal_id.entry(id.as_str()).or_default().push(event),
            None => loose.push(event),
        }
    }

    let mut meals = Vec::new();
    for events in by_meal_id.into_values() {
        meals.extend(bundle(&events));
    }

    loose.sort_by_key(|e| e.timestamp);
    let mut current: Vec<&Event> = Vec::new();
    for event in loose {
        if let Some(last) = current.last() {
            if event.timestamp - last.timestamp > gap {
                meals.extend(bundle(&current));
                current.clear();
            }
        }
        current.push(event);
    }
    meals.extend(bundle(&current));

    meals.sort_by_key(|m| m.timestamp);
    meals
}

fn bundle(events: &[&Event]) -> Option<Meal> {
    let first = events.first()?;
    let timestamp = events
        .iter()
        .map(|e| e.timestamp)
        .min()
        .unwrap_or(first.timestamp);
    Some(Meal {
        timestamp,
        item_ids: events.iter().map(|e| e.item_id.clone()).collect(),
    })
}

/// (dose, severity) observations for cause events carrying portion data
///
/// Severity is the mean of effects matched inside the window after each
/// cause; a cause with no matched effect observes severity 0.
fn dose_pairs(
    causes: &[Event],
    effects: &[Event],
    window: &crate::core::types::TimeWindow,
) -> Vec<DoseResponsePair> {
    causes
        .iter()
        .filter_map(|c| {
            let portion = c.portion.as_deref()?;
            let matched: Vec<f64> = effects
                .iter()
                .filter(|e| window.matches(c.timestamp, e.timestamp))
                .filter_map(|e| e.severity)
                .collect();
            let severity = if matched.is_empty() {
                0.0
            } else {
                matched.iter().sum::<f64>() / matched.len() as f64
            };
            Some(DoseResponsePair {
                dose: dose::dose_from_portion(portion),
                severity,
            })
        })
        .collect()
}
