//! Price / open-interest divergence
//!
//! Primary check looks at the last three per-step deltas: a bullish
//! divergence has price making a higher low (`p1 > p2 < p3`) while OI
//! makes a lower high (`o1 < o2 > o3`); bearish is the mirror. When no
//! three-delta pattern exists, a classical check compares the aggregate
//! direction of price and OI over the last five valid points.

use serde::Serialize;

use crate::analysis::math;
use crate::types::{Direction, PriceData};

pub const MIN_RAW_POINTS: usize = 4;
pub const MIN_DELTAS: usize = 3;
const CLASSICAL_SPAN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceType {
    Bullish,
    Bearish,
}

impl DivergenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DivergenceType::Bullish => "bullish",
            DivergenceType::Bearish => "bearish",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            DivergenceType::Bullish => Direction::Up,
            DivergenceType::Bearish => Direction::Down,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceResult {
    pub kind: DivergenceType,
    pub classical: bool,
    pub strength: f64,
    pub confidence: f64,
    pub price_deltas: Vec<f64>,
    pub oi_deltas: Vec<f64>,
    pub patterns: Vec<String>,
    /// Aggregate percent change over the inspected span
    pub price_change: f64,
    pub oi_change: f64,
}

#[derive(Debug, Clone)]
pub struct DivergenceCalculator {
    min_points: usize,
    classical_min_change: f64,
}

impl Default for DivergenceCalculator {
    fn default() -> Self {
        Self::new(MIN_RAW_POINTS, 0.5)
    }
}

impl DivergenceCalculator {
    pub fn new(min_points: usize, classical_min_change: f64) -> Self {
        Self {
            min_points: min_points.max(MIN_RAW_POINTS),
            classical_min_change,
        }
    }

    /// Per-step percent changes of price and OI across points with valid OI
    pub fn delta_series(window: &[PriceData]) -> (Vec<f64>, Vec<f64>) {
        let valid: Vec<&PriceData> = window
            .iter()
            .filter(|p| p.has_open_interest() && p.price > 0.0)
            .collect();
        let mut price_deltas = Vec::with_capacity(valid.len().saturating_sub(1));
        let mut oi_deltas = Vec::with_capacity(valid.len().saturating_sub(1));
        for pair in valid.windows(2) {
            if let (Some(p), Some(o)) = (
                math::percent_change(pair[0].price, pair[1].price),
                math::percent_change(pair[0].open_interest, pair[1].open_interest),
            ) {
                price_deltas.push(p);
                oi_deltas.push(o);
            }
        }
        (price_deltas, oi_deltas)
    }

    pub fn calculate(&self, window: &[PriceData]) -> Option<DivergenceResult> {
        if window.len() < self.min_points {
            return None;
        }
        let (price_deltas, oi_deltas) = Self::delta_series(window);
        if price_deltas.len() < MIN_DELTAS {
            return None;
        }

        self.three_step(&price_deltas, &oi_deltas)
            .or_else(|| self.classical(window, &price_deltas, &oi_deltas))
    }

    fn three_step(&self, price_deltas: &[f64], oi_deltas: &[f64]) -> Option<DivergenceResult> {
        let n = price_deltas.len();
        let (p1, p2, p3) = (price_deltas[n - 3], price_deltas[n - 2], price_deltas[n - 1]);
        let (o1, o2, o3) = (oi_deltas[n - 3], oi_deltas[n - 2], oi_deltas[n - 1]);

        let (kind, patterns) = if p1 > p2 && p2 < p3 && o1 < o2 && o2 > o3 {
            (DivergenceType::Bullish, ["price_higher_low", "oi_lower_high"])
        } else if p1 < p2 && p2 > p3 && o1 > o2 && o2 < o3 {
            (DivergenceType::Bearish, ["price_lower_high", "oi_higher_low"])
        } else {
            return None;
        };

        let strength = (p2.abs() + o2.abs()) / 2.0;
        let price_change: f64 = price_deltas[n - 3..].iter().sum();
        let oi_change: f64 = oi_deltas[n - 3..].iter().sum();
        Some(DivergenceResult {
            kind,
            classical: false,
            strength,
            confidence: self.confidence(strength, price_deltas, oi_deltas),
            price_deltas: price_deltas.to_vec(),
            oi_deltas: oi_deltas.to_vec(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            price_change,
            oi_change,
        })
    }

    fn classical(
        &self,
        window: &[PriceData],
        price_deltas: &[f64],
        oi_deltas: &[f64],
    ) -> Option<DivergenceResult> {
        let valid: Vec<&PriceData> = window.iter().filter(|p| p.has_open_interest()).collect();
        let span = &valid[valid.len().saturating_sub(CLASSICAL_SPAN)..];
        let first = span.first()?;
        let last = span.last()?;
        let price_change = math::percent_change(first.price, last.price)?;
        let oi_change = math::percent_change(first.open_interest, last.open_interest)?;

        let c = self.classical_min_change;
        let kind = if price_change >= c && oi_change <= -c {
            DivergenceType::Bearish
        } else if price_change <= -c && oi_change >= c {
            DivergenceType::Bullish
        } else {
            return None;
        };

        let strength = (price_change.abs() + oi_change.abs()) / 2.0;
        Some(DivergenceResult {
            kind,
            classical: true,
            strength,
            confidence: self.confidence(strength, price_deltas, oi_deltas),
            price_deltas: price_deltas.to_vec(),
            oi_deltas: oi_deltas.to_vec(),
            patterns: vec!["classical".to_string()],
            price_change,
            oi_change,
        })
    }

    /// Strength (cap 80) + point-count tier + pattern clarity, capped at 100
    pub fn confidence(&self, strength: f64, price_deltas: &[f64], oi_deltas: &[f64]) -> f64 {
        let strength_score = (strength * 10.0).min(80.0);
        let points_bonus = match price_deltas.len() {
            n if n >= 10 => 15.0,
            n if n >= 6 => 10.0,
            n if n >= MIN_DELTAS => 5.0,
            _ => 0.0,
        };
        (strength_score + points_bonus + clarity_bonus(price_deltas, oi_deltas)).min(100.0)
    }
}

fn clarity_bonus(price_deltas: &[f64], oi_deltas: &[f64]) -> f64 {
    let mut bonus = 0.0;
    let tail = &price_deltas[price_deltas.len().saturating_sub(3)..];
    let has_extremum = tail
        .windows(2)
        .any(|w| (w[0] > 0.0 && w[1] < 0.0) || (w[0] < 0.0 && w[1] > 0.0));
    if has_extremum {
        bonus += 5.0;
    }
    if price_deltas.iter().any(|d| d.abs() > 2.0) {
        bonus += 5.0;
    }
    if longest_same_sign(price_deltas) >= 3 || longest_same_sign(oi_deltas) >= 3 {
        bonus += 5.0;
    }
    bonus
}

fn longest_same_sign(deltas: &[f64]) -> usize {
    let mut best = 0;
    let mut current = 0;
    let mut last_sign = 0i8;
    for d in deltas {
        let sign = if *d > 0.0 {
            1
        } else if *d < 0.0 {
            -1
        } else {
            0
        };
        if sign != 0 && sign == last_sign {
            current += 1;
        } else {
            current = if sign == 0 { 0 } else { 1 };
        }
        last_sign = sign;
        best = best.max(current);
    }
    best
}
