//! Move scanning shared by the growth and fall analyzers

use std::collections::BTreeSet;

use super::{average_volume, math, minutes_between, prices};
use crate::types::{Direction, PriceData, Signal, SignalMetadata, SignalType};

/// Thresholds for one move direction
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MoveParams {
    /// Minimum absolute percent move
    pub threshold: f64,
    pub continuity_threshold: f64,
    pub high_volume_threshold: f64,
    pub low_volume_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MoveKind {
    Growth,
    Fall,
}

impl MoveKind {
    fn is_up(self) -> bool {
        matches!(self, MoveKind::Growth)
    }

    fn signal_type(self) -> SignalType {
        match self {
            MoveKind::Growth => SignalType::Growth,
            MoveKind::Fall => SignalType::Fall,
        }
    }
}

/// Index pairs worth scoring: every consecutive pair plus the global
/// extreme pair in move order
pub(crate) fn candidate_pairs(prices: &[f64], kind: MoveKind) -> Vec<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for i in 1..prices.len() {
        pairs.insert((i - 1, i));
    }

    let argmin = prices
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, &p)| match acc {
            Some((_, best)) if best <= p => acc,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i);
    let argmax = prices
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, &p)| match acc {
            Some((_, best)) if best >= p => acc,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i);

    if let (Some(lo), Some(hi)) = (argmin, argmax) {
        let (start, end) = if kind.is_up() { (lo, hi) } else { (hi, lo) };
        if start < end {
            pairs.insert((start, end));
        }
    }
    pairs.into_iter().collect()
}

pub(crate) fn scan_moves(
    window: &[PriceData],
    params: &MoveParams,
    kind: MoveKind,
    strategy: &str,
) -> Vec<Signal> {
    let series = prices(window);
    let mut signals = Vec::new();

    for (start, end) in candidate_pairs(&series, kind) {
        let Some(change) = math::percent_change(series[start], series[end]) else {
            continue;
        };
        let qualifies = match kind {
            MoveKind::Growth => change >= params.threshold,
            MoveKind::Fall => change <= -params.threshold,
        };
        if !qualifies {
            continue;
        }

        let segment = &window[start..=end];
        let magnitude = change.abs();
        let minutes = minutes_between(window[start].timestamp, window[end].timestamp);

        let base = (magnitude * 10.0).min(70.0);
        let avg_volume = average_volume(segment);
        let volume_bonus = if avg_volume >= params.high_volume_threshold {
            10.0
        } else if avg_volume < params.low_volume_threshold {
            -5.0
        } else {
            0.0
        };
        let speed_bonus = (magnitude / minutes.max(1.0) * 5.0).min(10.0);
        let continuity = math::directional_share(&series[start..=end], kind.is_up());
        let continuity_bonus = if continuity >= params.continuity_threshold {
            15.0 * continuity
        } else {
            5.0 * continuity
        };
        let confidence = base + volume_bonus + speed_bonus + continuity_bonus;

        let mut metadata = SignalMetadata::new(strategy)
            .with_tag(if end - start == 1 { "consecutive" } else { "range" })
            .with_indicator("base_score", base)
            .with_indicator("volume_bonus", volume_bonus)
            .with_indicator("speed_bonus", speed_bonus)
            .with_indicator("continuity", continuity)
            .with_indicator("continuity_bonus", continuity_bonus)
            .with_indicator("avg_volume", avg_volume)
            .with_indicator("trend_strength", math::trend_strength(&series[start..=end]))
            .with_indicator("volatility", math::volatility(&series[start..=end]));
        metadata.is_continuous = continuity >= params.continuity_threshold;
        metadata.continuous_from = Some(start);
        metadata.continuous_to = Some(end);

        let direction = if kind.is_up() { Direction::Up } else { Direction::Down };
        let signal = Signal::new(
            &window[end].symbol,
            kind.signal_type(),
            direction,
            change,
            confidence,
            end - start + 1,
            series[start],
            series[end],
            window[end].volume_24h,
            window[end].timestamp,
            metadata,
        )
        .with_period(minutes.round().max(1.0) as u32);

        signals.push(signal);
    }

    signals
}
