//! Continuous trend detection: the longest run of same-direction moves

use super::settings::SettingsReader;
use super::{math, minutes_between, prices, Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::{EngineError, Result};
use crate::types::{
    AnalyzerConfig, AnalyzerStats, Direction, PriceData, Settings, Signal, SignalMetadata,
    SignalType,
};

pub const NAME: &str = "continuous_analyzer";
const VERSION: &str = "1.3.0";

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSettings {
    /// Minimum number of price points in a run (moves + 1)
    pub min_continuous_points: usize,
    /// Minimum absolute percent change across the run
    pub min_total_change: f64,
}

impl Default for ContinuousSettings {
    fn default() -> Self {
        Self {
            min_continuous_points: 3,
            min_total_change: 0.1,
        }
    }
}

impl AnalyzerSettings for ContinuousSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        let min_continuous_points = r.get_usize("min_continuous_points", d.min_continuous_points)?;
        if min_continuous_points < 2 {
            return Err(EngineError::invalid_setting(
                "min_continuous_points",
                "a run needs at least 2 points",
            ));
        }
        Ok(Self {
            min_continuous_points,
            min_total_change: r.get_non_negative_f64("min_total_change", d.min_total_change)?,
        })
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        enabled: true,
        weight: 0.8,
        min_confidence: 60.0,
        min_data_points: 3,
        ..Default::default()
    }
    .with_setting("min_continuous_points", 3)
}

/// A stretch of strictly same-direction moves, inclusive indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    pub start: usize,
    pub end: usize,
    pub direction: Direction,
}

impl Run {
    pub fn points(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Longest run of strictly same-direction moves; later runs win ties
pub fn longest_run(prices: &[f64]) -> Option<Run> {
    let mut best: Option<Run> = None;
    let mut current: Option<Run> = None;

    for i in 1..prices.len() {
        let direction = Direction::from_change(prices[i] - prices[i - 1]);
        current = match (current, direction) {
            (_, Direction::Neutral) => None,
            (Some(run), d) if run.direction == d => Some(Run { end: i, ..run }),
            (_, d) => Some(Run {
                start: i - 1,
                end: i,
                direction: d,
            }),
        };
        if let Some(run) = current {
            if best.map_or(true, |b| run.points() >= b.points()) {
                best = Some(run);
            }
        }
    }
    best
}

pub fn confidence_for(points: usize, change: f64) -> f64 {
    let confidence = (points as f64 * 20.0).min(60.0) + (change.abs() * 2.0).min(40.0);
    confidence.min(100.0)
}

pub struct ContinuousAnalyzer {
    core: AnalyzerCore<ContinuousSettings>,
}

impl ContinuousAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
        })
    }

    fn scan(window: &[PriceData], settings: &ContinuousSettings) -> Vec<Signal> {
        let series = prices(window);

        if let Some(run) = longest_run(&series) {
            if run.points() >= settings.min_continuous_points {
                if let Some(change) = math::percent_change(series[run.start], series[run.end]) {
                    if change.abs() >= settings.min_total_change {
                        return vec![Self::build(window, &series, run, change, run.points(), true)];
                    }
                }
            }
        }

        // Fallback: count moves that follow the window's net direction
        let Some(net) = math::percent_change(series[0], series[series.len() - 1]) else {
            return Vec::new();
        };
        let direction = Direction::from_change(net);
        if direction == Direction::Neutral || net.abs() < settings.min_total_change {
            return Vec::new();
        }
        let share = math::directional_share(&series, direction == Direction::Up);
        let moves = (share * (series.len() - 1) as f64).round() as usize;
        let points = moves + 1;
        if points < settings.min_continuous_points {
            return Vec::new();
        }
        let run = Run {
            start: 0,
            end: series.len() - 1,
            direction,
        };
        vec![Self::build(window, &series, run, net, points, false)]
    }

    fn build(
        window: &[PriceData],
        series: &[f64],
        run: Run,
        change: f64,
        points: usize,
        strict: bool,
    ) -> Signal {
        let signal_type = match run.direction {
            Direction::Down => SignalType::ContinuousDown,
            _ => SignalType::ContinuousUp,
        };
        let segment = &series[run.start..=run.end];
        let mut metadata = SignalMetadata::new(NAME)
            .with_tag(if strict { "strict_run" } else { "fallback" })
            .with_indicator("run_points", points as f64)
            .with_indicator("consistency", math::consistency(segment))
            .with_indicator("trend_strength", math::trend_strength(segment));
        metadata.is_continuous = strict;
        metadata.continuous_from = Some(run.start);
        metadata.continuous_to = Some(run.end);

        let minutes = minutes_between(window[run.start].timestamp, window[run.end].timestamp);
        Signal::new(
            &window[run.end].symbol,
            signal_type,
            run.direction,
            change,
            confidence_for(points, change),
            points,
            series[run.start],
            series[run.end],
            window[run.end].volume_24h,
            window[run.end].timestamp,
            metadata,
        )
        .with_period(minutes.round().max(1.0) as u32)
    }
}

impl Analyzer for ContinuousAnalyzer {
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
