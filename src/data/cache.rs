//! TTL-boxed result cache
//!
//! Memoizes derived analysis results keyed by (user, cause, effect,
//! parameters). Entries are lazily evicted on read once expired and can be
//! bulk-invalidated when a referenced identity receives a new event, which
//! bounds staleness by time-until-next-request instead of the full TTL.
//!
//! One lock guards the map: results are derived and order-independent for
//! a given computed_at, so last write wins.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Cache key: identity pair plus a free-form parameter discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub cause_id: String,
    pub effect_id: String,
    /// Extra discriminators (range label, lag, ...), empty when unused
    pub params: String,
}

impl CacheKey {
    pub fn new(user_id: &str, cause_id: &str, effect_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            cause_id: cause_id.to_string(),
            effect_id: effect_id.to_string(),
            params: String::new(),
        }
    }

    pub fn with_params(mut self, params: &str) -> Self {
        self.params = params.to_string();
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    computed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// TTL cache over derived results
pub struct ResultCache<T> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<T>>>,
    default_ttl: Duration,
}

impl<T: Clone> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ResultCache<T> {
    /// Cache with the default 24h TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(24))
    }

    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store under the default TTL
    pub fn set(&self, key: CacheKey, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: CacheKey, value: T, ttl: Duration) {
        let now = Utc::now();
        let entry = CacheEntry {
            value,
            computed_at: now,
            expires_at: now + ttl,
        };
        self.entries.lock().unwrap().insert(key, entry);
    }

    /// Unexpired value for the key; expired entries are evicted on the spot
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// When the entry under this key was computed, if still live
    pub fn computed_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| e.expires_at > Utc::now())
            .map(|e| e.computed_at)
    }

    /// Does the user have any live entry computed within `max_age`?
    pub fn has_fresh_for_user(&self, user_id: &str, max_age: Duration) -> bool {
        let cutoff = Utc::now() - max_age;
        let now = Utc::now();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(k, e)| k.user_id == user_id && e.expires_at > now && e.computed_at >= cutoff)
    }

    /// Drop every entry referencing the cause for this user
    pub fn invalidate_by_cause(&self, user_id: &str, cause_id: &str) -> usize {
        self.invalidate(|k| k.user_id == user_id && k.cause_id == cause_id)
    }

    /// Drop every entry referencing the effect for this user
    pub fn invalidate_by_effect(&self, user_id: &str, effect_id: &str) -> usize {
        self.invalidate(|k| k.user_id == user_id && k.effect_id == effect_id)
    }

    /// Drop entries matching the predicate, returning how many went
    pub fn invalidate<F: Fn(&CacheKey) -> bool>(&self, predicate: F) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|k, _| !predicate(k));
        before - entries.len()
    }

    /// Sweep entries past their expiry
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Sweep entries computed before the cutoff, expired or not
    pub fn evict_computed_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.computed_at >= cutoff);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
