//! Volume analysis: three independent checks per window
//!
//! 1. Average volume above a floor
//! 2. Volume spike: a point at least `spike_multiplier` x the mean of the rest
//! 3. Price/volume confirmation or divergence, by sign agreement first -> last

use super::settings::SettingsReader;
use super::{average_volume, math, minutes_between, Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::Result;
use crate::types::{
    AnalyzerConfig, AnalyzerStats, Direction, PriceData, Settings, Signal, SignalMetadata,
    SignalType,
};

pub const NAME: &str = "volume_analyzer";
const VERSION: &str = "1.2.0";

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSettings {
    pub min_volume: f64,
    pub spike_multiplier: f64,
    /// Minimum absolute price change (%) for the confirmation check
    pub min_price_change: f64,
    /// Minimum absolute volume change (%) for the confirmation check
    pub min_volume_change: f64,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            min_volume: 100_000.0,
            spike_multiplier: 3.0,
            min_price_change: 1.0,
            min_volume_change: 10.0,
        }
    }
}

impl AnalyzerSettings for VolumeSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        Ok(Self {
            min_volume: r.get_positive_f64("min_volume", d.min_volume)?,
            spike_multiplier: r.get_positive_f64("spike_multiplier", d.spike_multiplier)?,
            min_price_change: r.get_non_negative_f64("min_price_change", d.min_price_change)?,
            min_volume_change: r.get_non_negative_f64("min_volume_change", d.min_volume_change)?,
        })
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        enabled: true,
        weight: 0.6,
        min_confidence: 50.0,
        min_data_points: 3,
        ..Default::default()
    }
    .with_setting("min_volume", 100_000.0)
    .with_setting("spike_multiplier", 3.0)
}

pub struct VolumeAnalyzer {
    core: AnalyzerCore<VolumeSettings>,
}

impl VolumeAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
        })
    }

    fn scan(window: &[PriceData], settings: &VolumeSettings) -> Vec<Signal> {
        let mut signals = Vec::new();
        if let Some(s) = Self::check_average(window, settings) {
            signals.push(s);
        }
        if let Some(s) = Self::check_spike(window, settings) {
            signals.push(s);
        }
        if let Some(s) = Self::check_confirmation(window, settings) {
            signals.push(s);
        }
        signals
    }

    fn check_average(window: &[PriceData], settings: &VolumeSettings) -> Option<Signal> {
        let avg = average_volume(window);
        if avg < settings.min_volume {
            return None;
        }
        let first = &window[0];
        let last = &window[window.len() - 1];
        let change = math::percent_change(first.price, last.price).unwrap_or(0.0);
        let confidence = (50.0 + (avg / settings.min_volume - 1.0) * 10.0).min(80.0);

        let metadata = SignalMetadata::new(NAME)
            .with_tag("high_volume")
            .with_indicator("avg_volume", avg)
            .with_indicator("volume_floor", settings.min_volume);
        Some(Self::signal(
            window,
            SignalType::HighVolume,
            Direction::from_change(change),
            change,
            confidence,
            (first, last),
            avg,
            metadata,
        ))
    }

    fn check_spike(window: &[PriceData], settings: &VolumeSettings) -> Option<Signal> {
        if window.len() < 2 {
            return None;
        }
        let (idx, peak) = window
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.volume_24h.total_cmp(&b.1.volume_24h))?;
        let rest: Vec<f64> = window
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, p)| p.volume_24h)
            .collect();
        let rest_mean = math::mean(&rest);
        if rest_mean <= 0.0 {
            return None;
        }
        let ratio = peak.volume_24h / rest_mean;
        if ratio < settings.spike_multiplier {
            return None;
        }

        let before = &window[idx.saturating_sub(1)];
        let change = math::percent_change(before.price, peak.price).unwrap_or(0.0);
        let confidence = (40.0 + (ratio - settings.spike_multiplier) * 10.0).min(90.0);

        let metadata = SignalMetadata::new(NAME)
            .with_tag("volume_spike")
            .with_indicator("spike_ratio", ratio)
            .with_indicator("spike_index", idx as f64)
            .with_indicator("baseline_volume", rest_mean);
        Some(Self::signal(
            window,
            SignalType::VolumeSpike,
            Direction::from_change(change),
            change,
            confidence,
            (before, peak),
            peak.volume_24h,
            metadata,
        ))
    }

    fn check_confirmation(window: &[PriceData], settings: &VolumeSettings) -> Option<Signal> {
        if window.len() < 2 {
            return None;
        }
        let first = &window[0];
        let last = &window[window.len() - 1];
        let price_change = math::percent_change(first.price, last.price)?;
        let volume_change = math::percent_change(first.volume_24h, last.volume_24h)?;
        if price_change.abs() < settings.min_price_change
            || volume_change.abs() < settings.min_volume_change
        {
            return None;
        }

        let agree = (price_change > 0.0) == (volume_change > 0.0);
        let (signal_type, direction, bonus) = if agree {
            (SignalType::VolumeConfirmation, Direction::from_change(price_change), 10.0)
        } else {
            (SignalType::VolumeDivergence, Direction::Neutral, 0.0)
        };
        let confidence =
            (price_change.abs() * 10.0).min(50.0) + (volume_change.abs() / 5.0).min(30.0) + bonus;

        let volumes: Vec<f64> = window.iter().map(|p| p.volume_24h).collect();
        let prices: Vec<f64> = window.iter().map(|p| p.price).collect();
        let metadata = SignalMetadata::new(NAME)
            .with_tag(if agree { "confirmation" } else { "divergence" })
            .with_indicator("price_change", price_change)
            .with_indicator("volume_change", volume_change)
            .with_indicator("price_volume_correlation", math::correlation(&prices, &volumes));
        Some(Self::signal(
            window,
            signal_type,
            direction,
            price_change,
            confidence,
            (first, last),
            last.volume_24h,
            metadata,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn signal(
        window: &[PriceData],
        signal_type: SignalType,
        direction: Direction,
        change: f64,
        confidence: f64,
        (start, end): (&PriceData, &PriceData),
        volume: f64,
        metadata: SignalMetadata,
    ) -> Signal {
        let minutes = minutes_between(start.timestamp, end.timestamp);
        Signal::new(
            &end.symbol,
            signal_type,
            direction,
            change,
            confidence,
            window.len(),
            start.price,
            end.price,
            volume,
            end.timestamp,
            metadata,
        )
        .with_period(minutes.round().max(1.0) as u32)
    }
}

impl Analyzer for VolumeAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>> {
        self.core
            .run(NAME, window, config, |settings| Self::scan(window, settings))
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
