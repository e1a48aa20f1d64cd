//! Application configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment
//! (`SIGNAL_ENGINE_` prefix, `__` between nested keys, e.g.
//! `SIGNAL_ENGINE_FILTERS__MIN_VOLUME=250000`).

use chrono::Duration;
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::filter::{FilterChain, RateLimitFilter, VolumeFilter};
use crate::registry::{AnalyzerFactory, ANALYZER_NAMES};
use crate::types::{AnalyzerConfig, Settings};

const ENV_PREFIX: &str = "SIGNAL_ENGINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Per-analyzer overrides keyed by short name (`growth`, `counter`, ...)
    #[serde(default)]
    pub analyzers: BTreeMap<String, AnalyzerOverride>,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    pub telegram: Option<TelegramConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            analyzers: BTreeMap::new(),
            filters: FilterConfig::default(),
            notifications: NotificationConfig::default(),
            telegram: None,
        }
    }
}

/// Partial `[analyzers.<name>]` table; unset fields keep the analyzer's
/// own defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerOverride {
    pub enabled: Option<bool>,
    pub weight: Option<f64>,
    pub min_confidence: Option<f64>,
    pub min_data_points: Option<usize>,
    #[serde(default)]
    pub custom_settings: Settings,
}

impl AnalyzerOverride {
    /// Overlay onto `base`, key by key for custom settings
    pub fn apply(&self, mut base: AnalyzerConfig) -> AnalyzerConfig {
        if let Some(enabled) = self.enabled {
            base.enabled = enabled;
        }
        if let Some(weight) = self.weight {
            base.weight = weight;
        }
        if let Some(min_confidence) = self.min_confidence {
            base.min_confidence = min_confidence;
        }
        if let Some(min_data_points) = self.min_data_points {
            base.min_data_points = min_data_points;
        }
        for (key, value) in &self.custom_settings {
            base.custom_settings.insert(key.clone(), value.clone());
        }
        base
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum seconds between accepted signals per symbol, 0 disables
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: u64,
    /// Volume floor, 0 disables
    #[serde(default)]
    pub min_volume: f64,
}

fn default_rate_limit_secs() -> u64 {
    60
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rate_limit_secs: default_rate_limit_secs(),
            min_volume: 0.0,
        }
    }
}

impl FilterConfig {
    pub fn build_chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        if self.min_volume > 0.0 {
            chain = chain.with(VolumeFilter::new(self.min_volume));
        }
        if self.rate_limit_secs > 0 {
            let secs = i64::try_from(self.rate_limit_secs).unwrap_or(i64::MAX / 1000);
            chain = chain.with(RateLimitFilter::new(Duration::seconds(secs)));
        }
        chain
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Capacity of the signal and counter event queues
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_queue_size() -> usize {
    256
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl Config {
    /// Load `path` if it exists, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Effective config for one analyzer: the catalogue defaults with
    /// whatever the file sets laid on top
    pub fn analyzer_config(&self, name: &str) -> Result<AnalyzerConfig> {
        let defaults = AnalyzerFactory::default_config(name)?;
        Ok(match self.analyzers.get(name) {
            Some(overrides) => overrides.apply(defaults),
            None => defaults,
        })
    }

    /// Effective configs for every known analyzer plus any configured name
    pub fn analyzer_configs(&self) -> Result<BTreeMap<String, AnalyzerConfig>> {
        let mut names: Vec<&str> = ANALYZER_NAMES.to_vec();
        for name in self.analyzers.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
            .into_iter()
            .map(|name| -> Result<(String, AnalyzerConfig)> {
                Ok((name.to_string(), self.analyzer_config(name)?))
            })
            .collect()
    }
}
