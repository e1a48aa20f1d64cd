//! Growth detection: qualifying upward moves between consecutive points
//! and across the window's low -> high range

use super::moves::{scan_moves, MoveKind, MoveParams};
use super::settings::SettingsReader;
use super::{Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::Result;
use crate::types::{AnalyzerConfig, AnalyzerStats, PriceData, Settings, Signal};

pub const NAME: &str = "growth_analyzer";
const VERSION: &str = "2.1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSettings {
    /// Minimum growth in percent
    pub min_growth: f64,
    /// Share of up-moves (0-1) for the full continuity bonus
    pub continuity_threshold: f64,
    pub high_volume_threshold: f64,
    pub low_volume_threshold: f64,
}

impl Default for GrowthSettings {
    fn default() -> Self {
        Self {
            min_growth: 2.0,
            continuity_threshold: 0.7,
            high_volume_threshold: 1_000_000.0,
            low_volume_threshold: 100_000.0,
        }
    }
}

impl AnalyzerSettings for GrowthSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        Ok(Self {
            min_growth: r.get_positive_f64("min_growth", d.min_growth)?,
            continuity_threshold: r.get_non_negative_f64("continuity_threshold", d.continuity_threshold)?,
            high_volume_threshold: r.get_non_negative_f64("high_volume_threshold", d.high_volume_threshold)?,
            low_volume_threshold: r.get_non_negative_f64("low_volume_threshold", d.low_volume_threshold)?,
        })
    }
}

impl GrowthSettings {
    fn move_params(&self) -> MoveParams {
        MoveParams {
            threshold: self.min_growth,
            continuity_threshold: self.continuity_threshold,
            high_volume_threshold: self.high_volume_threshold,
            low_volume_threshold: self.low_volume_threshold,
        }
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        enabled: true,
        weight: 1.0,
        min_confidence: 60.0,
        min_data_points: 2,
        ..Default::default()
    }
    .with_setting("min_growth", 2.0)
    .with_setting("continuity_threshold", 0.7)
}

pub struct GrowthAnalyzer {
    core: AnalyzerCore<GrowthSettings>,
}

impl GrowthAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
        })
    }

    pub fn settings(&self) -> GrowthSettings {
        self.core.settings()
    }
}

impl Analyzer for GrowthAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>> {
        self.core.run(NAME, window, config, |settings| {
            scan_moves(window, &settings.move_params(), MoveKind::Growth, NAME)
        })
    }

    fn config(&self) -> AnalyzerConfig {
        self.core.config()
    }

    fn stats(&self) -> AnalyzerStats {
        self.core.stats()
    }

    fn reconfigure(&self, config: AnalyzerConfig) -> Result<()> {
        self.core.reconfigure(config)
    }
}
