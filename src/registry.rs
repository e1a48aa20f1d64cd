//! Analyzer construction and lookup
//!
//! [`AnalyzerFactory`] maps short names to analyzers and owns the default
//! configuration catalogue. [`AnalyzerRegistry`] holds the constructed
//! instances for the lifetime of the engine; configuration changes go
//! through `reconfigure`, never through re-instantiation.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::analysis::{continuous, fall, growth, volume, Analyzer};
use crate::analysis::{ContinuousAnalyzer, FallAnalyzer, GrowthAnalyzer, VolumeAnalyzer};
use crate::counter::{self, CounterAnalyzer, CounterEvent};
use crate::error::{EngineError, Result};
use crate::open_interest::{self, OpenInterestAnalyzer};
use crate::types::AnalyzerConfig;

pub const ANALYZER_NAMES: [&str; 6] = [
    "growth",
    "fall",
    "continuous",
    "volume",
    "open_interest",
    "counter",
];

#[derive(Default, Clone)]
pub struct AnalyzerFactory {
    counter_events: Option<mpsc::Sender<CounterEvent>>,
}

impl AnalyzerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter analyzers built by this factory publish to `tx`
    pub fn with_counter_events(mut self, tx: mpsc::Sender<CounterEvent>) -> Self {
        self.counter_events = Some(tx);
        self
    }

    pub fn default_config(name: &str) -> Result<AnalyzerConfig> {
        match name {
            "growth" => Ok(growth::default_config()),
            "fall" => Ok(fall::default_config()),
            "continuous" => Ok(continuous::default_config()),
            "volume" => Ok(volume::default_config()),
            "open_interest" => Ok(open_interest::default_config()),
            "counter" => Ok(counter::default_config()),
            other => Err(EngineError::UnknownAnalyzer(other.to_string())),
        }
    }

    /// Fresh default configs for every known analyzer
    pub fn default_configs() -> BTreeMap<String, AnalyzerConfig> {
        ANALYZER_NAMES
            .iter()
            .filter_map(|name| Some((name.to_string(), Self::default_config(name).ok()?)))
            .collect()
    }

    pub fn create(&self, name: &str, config: AnalyzerConfig) -> Result<Arc<dyn Analyzer>> {
        let analyzer: Arc<dyn Analyzer> = match name {
            "growth" => Arc::new(GrowthAnalyzer::new(config)?),
            "fall" => Arc::new(FallAnalyzer::new(config)?),
            "continuous" => Arc::new(ContinuousAnalyzer::new(config)?),
            "volume" => Arc::new(VolumeAnalyzer::new(config)?),
            "open_interest" => Arc::new(OpenInterestAnalyzer::new(config)?),
            "counter" => {
                let counter = CounterAnalyzer::new(config)?;
                match &self.counter_events {
                    Some(tx) => Arc::new(counter.with_events(tx.clone())),
                    None => Arc::new(counter),
                }
            }
            other => return Err(EngineError::UnknownAnalyzer(other.to_string())),
        };
        Ok(analyzer)
    }

    /// Build every analyzer named in `configs`; the first failure aborts
    pub fn create_all(
        &self,
        configs: &BTreeMap<String, AnalyzerConfig>,
    ) -> Result<Vec<(String, Arc<dyn Analyzer>)>> {
        configs
            .iter()
            .map(|(name, config)| -> Result<(String, Arc<dyn Analyzer>)> {
                Ok((name.clone(), self.create(name, config.clone())?))
            })
            .collect()
    }
}

/// Constructed-once analyzers keyed by short name
#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: RwLock<BTreeMap<String, Arc<dyn Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(
        factory: &AnalyzerFactory,
        configs: &BTreeMap<String, AnalyzerConfig>,
    ) -> Result<Self> {
        let registry = Self::new();
        for (name, analyzer) in factory.create_all(configs)? {
            registry.register(&name, analyzer);
        }
        Ok(registry)
    }

    /// Insert or replace the analyzer under `name`
    pub fn register(&self, name: &str, analyzer: Arc<dyn Analyzer>) {
        tracing::info!(
            "Registered analyzer {} ({} v{})",
            name,
            analyzer.name(),
            analyzer.version()
        );
        self.analyzers.write().insert(name.to_string(), analyzer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.analyzers.read().keys().cloned().collect()
    }

    /// Snapshot of all analyzers, in name order
    pub fn all(&self) -> Vec<(String, Arc<dyn Analyzer>)> {
        self.analyzers
            .read()
            .iter()
            .map(|(name, analyzer)| (name.clone(), Arc::clone(analyzer)))
            .collect()
    }

    /// Apply a new config to the existing instance; stats and state survive
    pub fn reconfigure(&self, name: &str, config: AnalyzerConfig) -> Result<()> {
        let analyzer = self
            .get(name)
            .ok_or_else(|| EngineError::UnknownAnalyzer(name.to_string()))?;
        analyzer.reconfigure(config)?;
        tracing::info!("Reconfigured analyzer {}", name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.analyzers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceData;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_default_catalogue() {
        let configs = AnalyzerFactory::default_configs();
        assert_eq!(configs.len(), ANALYZER_NAMES.len());
        for config in configs.values() {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_default_configs_are_fresh_values() {
        let mut a = AnalyzerFactory::default_config("growth").unwrap();
        a.min_confidence = 1.0;
        let b = AnalyzerFactory::default_config("growth").unwrap();
        assert_ne!(a.min_confidence, b.min_confidence);
    }

    #[test]
    fn test_create_every_analyzer() {
        let factory = AnalyzerFactory::new();
        let created = factory.create_all(&AnalyzerFactory::default_configs()).unwrap();
        let names: Vec<&str> = created.iter().map(|(_, a)| a.name()).collect();
        assert!(names.contains(&"growth_analyzer"));
        assert!(names.contains(&"open_interest_analyzer"));
        assert!(names.contains(&"counter_analyzer"));
        assert_eq!(created.len(), 6);
    }

    #[test]
    fn test_unknown_analyzer() {
        let factory = AnalyzerFactory::new();
        assert!(matches!(
            factory.create("momentum", AnalyzerConfig::default()),
            Err(EngineError::UnknownAnalyzer(_))
        ));
        let registry = AnalyzerRegistry::new();
        assert!(registry.reconfigure("momentum", AnalyzerConfig::default()).is_err());
    }

    #[test]
    fn test_reconfigure_keeps_instance_and_stats() {
        let factory = AnalyzerFactory::new();
        let mut configs = BTreeMap::new();
        configs.insert("growth".to_string(), growth::default_config());
        let registry = AnalyzerRegistry::from_configs(&factory, &configs).unwrap();

        let before = registry.get("growth").unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = vec![
            PriceData::new("BTCUSDT", 100.0, t0),
            PriceData::new("BTCUSDT", 103.0, t0 + Duration::minutes(1)),
        ];
        before.analyze(&window, &before.config()).unwrap();

        let updated = growth::default_config().with_setting("min_growth", 5.0);
        registry.reconfigure("growth", updated.clone()).unwrap();

        let after = registry.get("growth").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.config(), updated);
        assert_eq!(after.stats().total_calls, 1);
    }

    #[test]
    fn test_invalid_reconfigure_is_rejected() {
        let registry = AnalyzerRegistry::new();
        let analyzer = AnalyzerFactory::new()
            .create("volume", volume::default_config())
            .unwrap();
        registry.register("volume", analyzer);

        let bad = volume::default_config().with_setting("min_volume", -1.0);
        assert!(registry.reconfigure("volume", bad).is_err());
        assert_eq!(
            registry.get("volume").unwrap().config(),
            volume::default_config()
        );
        assert_eq!(registry.names(), vec!["volume".to_string()]);
    }
}
