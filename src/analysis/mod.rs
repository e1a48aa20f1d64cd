//! Pattern analyzers and the shared analyzer plumbing
//!
//! Every analyzer implements [`Analyzer`]. Stateless analyzers keep only
//! their configuration and call statistics inside an [`AnalyzerCore`]:
//! the analysis path takes the read lock to snapshot settings, statistics
//! are recorded under the write lock afterwards.

pub mod continuous;
pub mod fall;
pub mod growth;
pub mod math;
mod moves;
pub mod settings;
pub mod volume;


pub use continuous::ContinuousAnalyzer;
pub use fall::FallAnalyzer;
pub use growth::GrowthAnalyzer;
pub use volume::VolumeAnalyzer;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Instant;

use crate::error::{EngineError, Result};
use crate::types::{AnalyzerConfig, AnalyzerStats, PriceData, Settings, Signal};

/// Common interface of every signal analyzer
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn supports(&self, symbol: &str) -> bool {
        !symbol.is_empty()
    }

    /// Scan one window and return the signals that meet `config.min_confidence`
    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>>;

    fn config(&self) -> AnalyzerConfig;

    fn stats(&self) -> AnalyzerStats;

    /// Replace the configuration in place, keeping stats and state
    fn reconfigure(&self, config: AnalyzerConfig) -> Result<()>;

    /// Drop per-symbol state untouched for longer than `max_age`.
    /// Returns the number of evicted symbols.
    fn cleanup(&self, _max_age: chrono::Duration) -> usize {
        0
    }

    /// Forget all per-symbol state
    fn reset(&self) {}
}

/// Typed view over `custom_settings`, validated once
pub trait AnalyzerSettings: Clone + Send + Sync + Sized {
    fn from_settings(settings: &Settings) -> Result<Self>;
}

struct CoreState<S> {
    config: AnalyzerConfig,
    settings: S,
    stats: AnalyzerStats,
}

/// Config, typed settings and stats behind a single read-write lock
pub struct AnalyzerCore<S> {
    inner: RwLock<CoreState<S>>,
}

impl<S: AnalyzerSettings> AnalyzerCore<S> {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let settings = S::from_settings(&config.custom_settings)?;
        Ok(Self {
            inner: RwLock::new(CoreState {
                config,
                settings,
                stats: AnalyzerStats::default(),
            }),
        })
    }

    pub fn settings(&self) -> S {
        self.inner.read().settings.clone()
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.inner.read().config.clone()
    }

    pub fn stats(&self) -> AnalyzerStats {
        self.inner.read().stats.clone()
    }

    pub fn reconfigure(&self, config: AnalyzerConfig) -> Result<()> {
        self.replace(config).map(|_| ())
    }

    /// Swap in a new config and return the `(previous, current)` settings
    /// as seen under the same write lock
    pub fn replace(&self, config: AnalyzerConfig) -> Result<(S, S)> {
        config.validate()?;
        let settings = S::from_settings(&config.custom_settings)?;
        let mut inner = self.inner.write();
        inner.config = config;
        let previous = std::mem::replace(&mut inner.settings, settings);
        Ok((previous, inner.settings.clone()))
    }

    /// Read-modify-write of the typed settings and the stored bag under
    /// one write lock
    pub fn modify_settings<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut S, &mut Settings) -> R,
    {
        let mut inner = self.inner.write();
        let CoreState {
            config, settings, ..
        } = &mut *inner;
        update(settings, &mut config.custom_settings)
    }

    /// Run one analysis pass with precondition checks, confidence gating
    /// and stats bookkeeping
    pub fn run<F>(
        &self,
        analyzer: &str,
        window: &[PriceData],
        config: &AnalyzerConfig,
        scan: F,
    ) -> Result<Vec<Signal>>
    where
        F: FnOnce(&S) -> Vec<Signal>,
    {
        self.run_gated(analyzer, window, config, true, scan)
    }

    /// Like [`AnalyzerCore::run`] but leaves confidence gating to the caller,
    /// for analyzers with a threshold per check
    pub fn run_ungated<F>(
        &self,
        analyzer: &str,
        window: &[PriceData],
        config: &AnalyzerConfig,
        scan: F,
    ) -> Result<Vec<Signal>>
    where
        F: FnOnce(&S) -> Vec<Signal>,
    {
        self.run_gated(analyzer, window, config, false, scan)
    }

    fn run_gated<F>(
        &self,
        analyzer: &str,
        window: &[PriceData],
        config: &AnalyzerConfig,
        gate: bool,
        scan: F,
    ) -> Result<Vec<Signal>>
    where
        F: FnOnce(&S) -> Vec<Signal>,
    {
        let started = Instant::now();
        let result = self.scan(analyzer, window, config, gate, scan);
        self.inner
            .write()
            .stats
            .record(started.elapsed(), result.is_ok(), Utc::now());
        result
    }

    fn scan<F>(
        &self,
        analyzer: &str,
        window: &[PriceData],
        config: &AnalyzerConfig,
        gate: bool,
        scan: F,
    ) -> Result<Vec<Signal>>
    where
        F: FnOnce(&S) -> Vec<Signal>,
    {
        let need = config.min_data_points.max(1);
        if window.len() < need {
            return Err(EngineError::InsufficientData {
                need,
                got: window.len(),
            });
        }
        if !config.enabled {
            return Ok(Vec::new());
        }

        let settings = self.settings();
        let mut signals = scan(&settings);
        if gate {
            signals.retain(|s| s.confidence >= config.min_confidence);
        }

        if !signals.is_empty() {
            tracing::debug!(
                "{} produced {} signal(s) for {}",
                analyzer,
                signals.len(),
                window[0].symbol
            );
        }
        Ok(signals)
    }
}

/// Minutes between two timestamps, never negative
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds() as f64 / 60_000.0).max(0.0)
}

/// Average 24h volume of a slice of points
pub fn average_volume(points: &[PriceData]) -> f64 {
    let volumes: Vec<f64> = points.iter().map(|p| p.volume_24h).collect();
    math::mean(&volumes)
}

pub fn prices(points: &[PriceData]) -> Vec<f64> {
    points.iter().map(|p| p.price).collect()
}
