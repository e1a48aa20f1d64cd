//! Fall detection, the mirror of growth detection.
//! Fall signals carry a negative `change_percent`.

use super::moves::{scan_moves, MoveKind, MoveParams};
use super::settings::SettingsReader;
use super::{Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::Result;
use crate::types::{AnalyzerConfig, AnalyzerStats, PriceData, Settings, Signal};

pub const NAME: &str = "fall_analyzer";
const VERSION: &str = "2.1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct FallSettings {
    /// Minimum fall in percent, given as a positive number
    pub min_fall: f64,
    pub continuity_threshold: f64,
    pub high_volume_threshold: f64,
    pub low_volume_threshold: f64,
}

impl Default for FallSettings {
    fn default() -> Self {
        Self {
            min_fall: 2.0,
            continuity_threshold: 0.7,
            high_volume_threshold: 1_000_000.0,
            low_volume_threshold: 100_000.0,
        }
    }
}

impl AnalyzerSettings for FallSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        // Accept "-2.0" as well as "2.0"
        let min_fall = r.get_f64("min_fall", d.min_fall)?.abs();
        if min_fall == 0.0 {
            return Err(crate::error::EngineError::invalid_setting(
                "min_fall",
                "must not be zero",
            ));
        }
        Ok(Self {
            min_fall,
            continuity_threshold: r.get_non_negative_f64("continuity_threshold", d.continuity_threshold)?,
            high_volume_threshold: r.get_non_negative_f64("high_volume_threshold", d.high_volume_threshold)?,
            low_volume_threshold: r.get_non_negative_f64("low_volume_threshold", d.low_volume_threshold)?,
        })
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
    .with_setting("min_fall", 2.0)
    .with_setting("continuity_threshold", 0.7)
}

pub struct FallAnalyzer {
    core: AnalyzerCore<FallSettings>,
}

impl FallAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
        })
    }

    pub fn settings(&self) -> FallSettings {
        self.core.settings()
    }
}

impl Analyzer for FallAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>> {
        self.core.run(NAME, window, config, |s| {
            let params = MoveParams {
                threshold: s.min_fall,
                continuity_threshold: s.continuity_threshold,
                high_volume_threshold: s.high_volume_threshold,
                low_volume_threshold: s.low_volume_threshold,
            };
            scan_moves(window, &params, MoveKind::Fall, NAME)
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
