//! Open-interest sub-engine
//!
//! [`StateManager`] is the only mutable piece; the calculators are pure
//! functions over a window. [`OpenInterestAnalyzer`] folds each window into
//! the state and then runs four independent checks:
//!
//! - OI growth alongside a price rise
//! - OI growth alongside a price fall
//! - extreme OI relative to the recent average
//! - price / OI divergence

pub mod confidence;
pub mod divergence;
pub mod extreme;
pub mod state;


pub use confidence::{ConfidenceCalculator, OiMove};
pub use divergence::{DivergenceCalculator, DivergenceResult, DivergenceType};
pub use extreme::{ExtremeCalculator, ExtremeResult, ExtremeType};
pub use state::{OIDataPoint, OIState, StateManager, HISTORY_LIMIT};

use std::sync::Arc;

use crate::analysis::settings::SettingsReader;
use crate::analysis::{minutes_between, Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::{EngineError, Result};
use crate::types::{
    AnalyzerConfig, AnalyzerStats, Direction, PriceData, Settings, Signal, SignalMetadata,
    SignalType,
};

pub const NAME: &str = "open_interest_analyzer";
const VERSION: &str = "1.4.0";

#[derive(Debug, Clone, PartialEq)]
pub struct OiSettings {
    /// Minimum absolute price change (%) for the growth checks
    pub min_price_change: f64,
    /// Minimum OI growth (%) for the growth checks
    pub min_oi_change: f64,
    pub extreme_oi_threshold: f64,
    pub divergence_min_points: usize,
    /// Minimum aggregate change (%) for the classical divergence fallback
    pub classical_min_change: f64,
    pub check_growth_with_price: bool,
    pub check_growth_with_fall: bool,
    pub check_extreme: bool,
    pub check_divergence: bool,
    // Per-check gates; `None` falls back to the config's min_confidence
    pub growth_min_confidence: Option<f64>,
    pub fall_min_confidence: Option<f64>,
    pub extreme_min_confidence: Option<f64>,
    pub divergence_min_confidence: Option<f64>,
}

impl Default for OiSettings {
    fn default() -> Self {
        Self {
            min_price_change: 1.0,
            min_oi_change: 2.0,
            extreme_oi_threshold: 1.5,
            divergence_min_points: divergence::MIN_RAW_POINTS,
            classical_min_change: 0.5,
            check_growth_with_price: true,
            check_growth_with_fall: true,
            check_extreme: true,
            check_divergence: true,
            growth_min_confidence: None,
            fall_min_confidence: None,
            extreme_min_confidence: None,
            divergence_min_confidence: None,
        }
    }
}

impl AnalyzerSettings for OiSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        let extreme_oi_threshold = r.get_f64("extreme_oi_threshold", d.extreme_oi_threshold)?;
        if extreme_oi_threshold <= 1.0 {
            return Err(EngineError::invalid_setting(
                "extreme_oi_threshold",
                format!("must be greater than 1, got {}", extreme_oi_threshold),
            ));
        }
        let gate = |key: &str| -> Result<Option<f64>> {
            match r.get_optional_f64(key)? {
                Some(v) if !(0.0..=100.0).contains(&v) => Err(EngineError::invalid_setting(
                    key,
                    format!("must be within [0, 100], got {}", v),
                )),
                other => Ok(other),
            }
        };
        Ok(Self {
            min_price_change: r.get_non_negative_f64("min_price_change", d.min_price_change)?,
            min_oi_change: r.get_non_negative_f64("min_oi_change", d.min_oi_change)?,
            extreme_oi_threshold,
            divergence_min_points: r
                .get_usize("divergence_min_points", d.divergence_min_points)?
                .max(divergence::MIN_RAW_POINTS),
            classical_min_change: r
                .get_non_negative_f64("classical_min_change", d.classical_min_change)?,
            check_growth_with_price: r
                .get_bool("check_growth_with_price", d.check_growth_with_price)?,
            check_growth_with_fall: r.get_bool("check_growth_with_fall", d.check_growth_with_fall)?,
            check_extreme: r.get_bool("check_extreme", d.check_extreme)?,
            check_divergence: r.get_bool("check_divergence", d.check_divergence)?,
            growth_min_confidence: gate("growth_min_confidence")?,
            fall_min_confidence: gate("fall_min_confidence")?,
            extreme_min_confidence: gate("extreme_min_confidence")?,
            divergence_min_confidence: gate("divergence_min_confidence")?,
        })
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        enabled: true,
        weight: 0.8,
        min_confidence: 50.0,
        min_data_points: 3,
        ..Default::default()
    }
    .with_setting("min_price_change", 1.0)
    .with_setting("min_oi_change", 2.0)
    .with_setting("extreme_oi_threshold", 1.5)
    .with_setting("divergence_min_points", 4)
}

pub struct OpenInterestAnalyzer {
    core: AnalyzerCore<OiSettings>,
    states: Arc<StateManager>,
    confidence: ConfidenceCalculator,
}

impl OpenInterestAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Self::with_state_manager(config, Arc::new(StateManager::new()))
    }

    pub fn with_state_manager(config: AnalyzerConfig, states: Arc<StateManager>) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
            states,
            confidence: ConfidenceCalculator::new(),
        })
    }

    pub fn settings(&self) -> OiSettings {
        self.core.settings()
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.states
    }

    fn scan(&self, window: &[PriceData], settings: &OiSettings, min_confidence: f64) -> Vec<Signal> {
        let symbol = window[0].symbol.as_str();
        let Some(state) = self
            .states
            .update_state(symbol, window, settings.extreme_oi_threshold)
        else {
            return Vec::new();
        };

        let gate = |specific: Option<f64>| specific.unwrap_or(min_confidence);
        let mut signals = Vec::new();

        if settings.check_growth_with_price {
            if let Some(s) = self.check_growth_with_price(window, &state, settings) {
                if s.confidence >= gate(settings.growth_min_confidence) {
                    signals.push(s);
                }
            }
        }
        if settings.check_growth_with_fall {
            if let Some(s) = self.check_growth_with_fall(window, &state, settings) {
                if s.confidence >= gate(settings.fall_min_confidence) {
                    signals.push(s);
                }
            }
        }
        if settings.check_extreme {
            if let Some(s) = Self::check_extreme(window, &state, settings) {
                if s.confidence >= gate(settings.extreme_min_confidence) {
                    signals.push(s);
                }
            }
        }
        if settings.check_divergence {
            if let Some(s) = Self::check_divergence(window, settings) {
                if s.confidence >= gate(settings.divergence_min_confidence) {
                    signals.push(s);
                }
            }
        }
        signals
    }

    fn oi_move(window: &[PriceData], state: &OIState) -> OiMove {
        OiMove {
            price_change: state.price_change,
            oi_change: state.oi_change,
            data_points: window.len(),
            duration_minutes: minutes_between(window[0].timestamp, window[window.len() - 1].timestamp),
        }
    }

    fn check_growth_with_price(
        &self,
        window: &[PriceData],
        state: &OIState,
        settings: &OiSettings,
    ) -> Option<Signal> {
        if state.price_change < settings.min_price_change || state.oi_change < settings.min_oi_change {
            return None;
        }
        let m = Self::oi_move(window, state);
        let confidence = self.confidence.growth_with_price(&m);
        let metadata = Self::state_metadata(state)
            .with_tag("oi_growth")
            .with_tag("price_up")
            .with_indicator(
                "sync_bonus",
                ConfidenceCalculator::sync_bonus(state.price_change, state.oi_change),
            );
        Some(Self::signal(
            window,
            SignalType::OiGrowthWithPrice,
            Direction::Up,
            state.price_change,
            confidence,
            metadata,
        ))
    }

    fn check_growth_with_fall(
        &self,
        window: &[PriceData],
        state: &OIState,
        settings: &OiSettings,
    ) -> Option<Signal> {
        if state.price_change > -settings.min_price_change || state.oi_change < settings.min_oi_change {
            return None;
        }
        let m = Self::oi_move(window, state);
        let confidence = self.confidence.growth_with_fall(&m);
        let metadata = Self::state_metadata(state)
            .with_tag("oi_growth")
            .with_tag("price_down")
            .with_indicator(
                "contrast_bonus",
                ConfidenceCalculator::contrast_bonus(state.price_change.abs(), state.oi_change),
            );
        Some(Self::signal(
            window,
            SignalType::OiGrowthWithFall,
            Direction::Down,
            state.price_change,
            confidence,
            metadata,
        ))
    }

    fn check_extreme(window: &[PriceData], state: &OIState, settings: &OiSettings) -> Option<Signal> {
        let result = ExtremeCalculator::new(settings.extreme_oi_threshold).calculate(state)?;
        let mut metadata = Self::state_metadata(state)
            .with_tag("extreme_oi")
            .with_indicator("extreme_ratio", result.ratio)
            .with_indicator("valid_points", result.valid_points as f64)
            .with_indicator("threshold", settings.extreme_oi_threshold);
        metadata.extreme_type = Some(result.extreme_type.as_str().to_string());
        if let Some(since) = state.extreme_since {
            metadata = metadata.with_indicator(
                "extreme_minutes",
                minutes_between(since, state.last_updated),
            );
        }
        Some(Self::signal(
            window,
            SignalType::ExtremeOi,
            result.direction,
            result.price_change,
            result.confidence,
            metadata,
        ))
    }

    fn check_divergence(window: &[PriceData], settings: &OiSettings) -> Option<Signal> {
        let calculator =
            DivergenceCalculator::new(settings.divergence_min_points, settings.classical_min_change);
        let result = calculator.calculate(window)?;
        let signal_type = match result.kind {
            DivergenceType::Bullish => SignalType::BullishOiDivergence,
            DivergenceType::Bearish => SignalType::BearishOiDivergence,
        };
        let mut metadata = SignalMetadata::new(NAME)
            .with_tag("divergence")
            .with_tag(if result.classical { "classical" } else { "three_step" })
            .with_indicator("strength", result.strength)
            .with_indicator("oi_change", result.oi_change)
            .with_indicator("deltas", result.price_deltas.len() as f64);
        metadata.divergence_type = Some(result.kind.as_str().to_string());
        metadata.patterns = result.patterns.clone();
        Some(Self::signal(
            window,
            signal_type,
            result.kind.direction(),
            result.price_change,
            result.confidence,
            metadata,
        ))
    }

    fn state_metadata(state: &OIState) -> SignalMetadata {
        SignalMetadata::new(NAME)
            .with_indicator("current_oi", state.current_oi)
            .with_indicator("avg_oi", state.avg_oi)
            .with_indicator("oi_ratio", state.oi_ratio)
            .with_indicator("oi_change", state.oi_change)
            .with_indicator("history_len", state.history.len() as f64)
    }

    fn signal(
        window: &[PriceData],
        signal_type: SignalType,
        direction: Direction,
        change: f64,
        confidence: f64,
        metadata: SignalMetadata,
    ) -> Signal {
        let first = &window[0];
        let last = &window[window.len() - 1];
        let minutes = minutes_between(first.timestamp, last.timestamp).round().max(1.0) as u32;
        Signal::new(
            &last.symbol,
            signal_type,
            direction,
            change,
            confidence,
            window.len(),
            first.price,
            last.price,
            last.volume_24h,
            last.timestamp,
            metadata,
        )
        .with_period(minutes)
    }
}

impl Analyzer for OpenInterestAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>> {
        self.core.run_ungated(NAME, window, config, |settings| {
            self.scan(window, settings, config.min_confidence)
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

    fn cleanup(&self, max_age: chrono::Duration) -> usize {
        let removed = self.states.cleanup(max_age);
        if removed > 0 {
            tracing::info!("Evicted {} idle OI state(s)", removed);
        }
        removed
    }

    fn reset(&self) {
        self.states.reset_all();
    }
}
