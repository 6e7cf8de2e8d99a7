//! Configuration loader
//!
//! Infrastructure settings only: cache lifetimes, scheduler cadence and
//! meal grouping. The statistical thresholds in the engines are part of
//! the algorithm and are deliberately not configurable.

use anyhow::Result;
use chrono::Duration;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub meals: MealConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "flaretrack".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a computed result stays valid
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Skip recompute when a result this fresh exists
    #[serde(default = "default_fresh_skip_hours")]
    pub fresh_skip_hours: i64,
    /// Entries computed longer ago than this are swept before a recompute
    #[serde(default = "default_stale_sweep_days")]
    pub stale_sweep_days: i64,
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_fresh_skip_hours() -> i64 {
    1
}

fn default_stale_sweep_days() -> i64 {
    7
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            fresh_skip_hours: default_fresh_skip_hours(),
            stale_sweep_days: default_stale_sweep_days(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours)
    }

    pub fn fresh_skip(&self) -> Duration {
        Duration::hours(self.fresh_skip_hours)
    }

    pub fn stale_sweep(&self) -> Duration {
        Duration::days(self.stale_sweep_days)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Quiet period after a trigger before recompute starts
    #[serde(default = "default_debounce_minutes")]
    pub debounce_minutes: u64,
    /// Pairs processed between cooperative yields
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_debounce_minutes() -> u64 {
    5
}

fn default_batch_size() -> usize {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_minutes: default_debounce_minutes(),
            batch_size: default_batch_size(),
        }
    }
}

impl SchedulerConfig {
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.debounce_minutes * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealConfig {
    /// Food entries this close together form one meal when no meal id
    /// was logged
    #[serde(default = "default_group_minutes")]
    pub group_minutes: i64,
    /// How long after a meal an effect still counts as following it
    #[serde(default = "default_follow_window_hours")]
    pub follow_window_hours: i64,
    /// Fewest meals a pair must appear in
    #[serde(default = "default_min_pair_sample")]
    pub min_pair_sample: usize,
}

fn default_group_minutes() -> i64 {
    90
}

fn default_follow_window_hours() -> i64 {
    24
}

fn default_min_pair_sample() -> usize {
    3
}

impl Default for MealConfig {
    fn default() -> Self {
        Self {
            group_minutes: default_group_minutes(),
            follow_window_hours: default_follow_window_hours(),
            min_pair_sample: default_min_pair_sample(),
        }
    }
}

impl MealConfig {
    pub fn group_gap(&self) -> Duration {
        Duration::minutes(self.group_minutes)
    }

    pub fn follow_window(&self) -> Duration {
        Duration::hours(self.follow_window_hours)
    }
}

impl AnalysisConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AnalysisConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
