//! Extreme open interest: current OI far above its recent average

use serde::Serialize;

use super::state::OIState;
use crate::types::Direction;

/// Minimum number of history entries with a usable OI reading
pub const MIN_VALID_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremeType {
    /// OI piling up while price rises
    LongBuildup,
    /// OI piling up while price falls
    ShortBuildup,
    FlatBuildup,
}

impl ExtremeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtremeType::LongBuildup => "long_buildup",
            ExtremeType::ShortBuildup => "short_buildup",
            ExtremeType::FlatBuildup => "flat_buildup",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeResult {
    pub ratio: f64,
    pub current_oi: f64,
    pub avg_oi: f64,
    pub valid_points: usize,
    pub price_change: f64,
    pub direction: Direction,
    pub extreme_type: ExtremeType,
    pub confidence: f64,
}

/// Judges extremity from the state's history-based `oi_ratio`, so the
/// state flag and the emitted signal always agree.
#[derive(Debug, Clone)]
pub struct ExtremeCalculator {
    threshold: f64,
}

impl ExtremeCalculator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_extreme(&self, state: &OIState) -> bool {
        state.current_oi > 0.0
            && state.avg_oi > 0.0
            && state.valid_points() >= MIN_VALID_POINTS
            && state.oi_ratio > self.threshold
    }

    /// `None` unless the state holds an extreme reading
    pub fn calculate(&self, state: &OIState) -> Option<ExtremeResult> {
        if !self.is_extreme(state) {
            return None;
        }

        let valid_points = state.valid_points();
        let direction = Direction::from_change(state.price_change);
        let extreme_type = match direction {
            Direction::Up => ExtremeType::LongBuildup,
            Direction::Down => ExtremeType::ShortBuildup,
            Direction::Neutral => ExtremeType::FlatBuildup,
        };

        Some(ExtremeResult {
            ratio: state.oi_ratio,
            current_oi: state.current_oi,
            avg_oi: state.avg_oi,
            valid_points,
            price_change: state.price_change,
            direction,
            extreme_type,
            confidence: self.confidence(state.oi_ratio, valid_points),
        })
    }

    /// Ratio excess + data-points tier + deviation tier, capped at 90
    pub fn confidence(&self, ratio: f64, valid_points: usize) -> f64 {
        let base = ((ratio - self.threshold) * 100.0).clamp(0.0, 50.0);
        let points_bonus = match valid_points {
            n if n >= 10 => 20.0,
            n if n >= 5 => 10.0,
            n if n >= 3 => 5.0,
            _ => 0.0,
        };
        let deviation_bonus = if ratio > self.threshold * 1.5 {
            15.0
        } else if ratio > self.threshold * 1.2 {
            8.0
        } else {
            0.0
        };
        (base + points_bonus + deviation_bonus).min(90.0)
    }
}
