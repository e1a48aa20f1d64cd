//! Per-symbol open-interest state
//!
//! `update_state` is the only mutator. Lookups go through the outer map
//! lock; mutation of one symbol happens under that symbol's own mutex.

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::extreme::ExtremeCalculator;
use crate::analysis::math;
use crate::types::PriceData;

/// Maximum number of history entries kept per symbol
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OIDataPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub open_interest: f64,
    pub volume: f64,
    /// Percent change vs. the previous history entry
    pub price_delta: f64,
    pub oi_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OIState {
    pub symbol: String,
    pub current_oi: f64,
    /// Mean of the valid OI readings in the bounded history
    pub avg_oi: f64,
    /// current / avg, 0 when undefined
    pub oi_ratio: f64,
    /// Percent change across the latest window
    pub price_change: f64,
    pub oi_change: f64,
    pub last_updated: DateTime<Utc>,
    pub history: VecDeque<OIDataPoint>,
    pub extreme_flag: bool,
    pub extreme_since: Option<DateTime<Utc>>,
}

impl OIState {
    fn new(symbol: &str, now: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            current_oi: 0.0,
            avg_oi: 0.0,
            oi_ratio: 0.0,
            price_change: 0.0,
            oi_change: 0.0,
            last_updated: now,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            extreme_flag: false,
            extreme_since: None,
        }
    }

    /// History entries with a usable OI reading
    pub fn valid_points(&self) -> usize {
        self.history
            .iter()
            .filter(|p| p.open_interest.is_finite() && p.open_interest > 0.0)
            .count()
    }

    fn push_point(&mut self, point: &PriceData, limit: usize) {
        let previous = self.history.back();
        if let Some(prev) = previous {
            if point.timestamp < prev.timestamp {
                return;
            }
        }
        let price_delta = previous
            .and_then(|p| math::percent_change(p.price, point.price))
            .unwrap_or(0.0);
        let oi_delta = previous
            .and_then(|p| math::percent_change(p.open_interest, point.open_interest))
            .unwrap_or(0.0);
        let entry = OIDataPoint {
            timestamp: point.timestamp,
            price: point.price,
            open_interest: point.open_interest,
            volume: point.volume_24h,
            price_delta,
            oi_delta,
        };

        match self.history.back_mut() {
            Some(last) if last.timestamp == point.timestamp => {
                // Same tick seen again: refresh values, keep the original deltas
                last.price = entry.price;
                last.open_interest = entry.open_interest;
                last.volume = entry.volume;
            }
            _ => self.history.push_back(entry),
        }
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    fn recompute(&mut self) {
        let valid: Vec<f64> = self
            .history
            .iter()
            .map(|p| p.open_interest)
            .filter(|oi| oi.is_finite() && *oi > 0.0)
            .collect();
        self.avg_oi = math::mean(&valid);
        self.oi_ratio = if self.avg_oi > 0.0 && self.current_oi > 0.0 {
            self.current_oi / self.avg_oi
        } else {
            tracing::debug!("OI ratio undefined for {} (avg_oi = {})", self.symbol, self.avg_oi);
            0.0
        };
    }
}

pub struct StateManager {
    states: RwLock<HashMap<String, Arc<Mutex<OIState>>>>,
    history_limit: usize,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self::with_history_limit(HISTORY_LIMIT)
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            history_limit: limit.clamp(1, HISTORY_LIMIT),
        }
    }

    fn entry(&self, symbol: &str) -> Arc<Mutex<OIState>> {
        if let Some(state) = self.states.read().get(symbol) {
            return Arc::clone(state);
        }
        let mut states = self.states.write();
        Arc::clone(
            states
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(OIState::new(symbol, Utc::now())))),
        )
    }

    /// Fold the latest window into the symbol's state and return a copy
    pub fn update_state(
        &self,
        symbol: &str,
        window: &[PriceData],
        extreme_threshold: f64,
    ) -> Option<OIState> {
        let first = window.first()?;
        let last = window.last()?;
        let now = Utc::now();

        let entry = self.entry(symbol);
        let mut state = entry.lock();

        state.price_change = math::percent_change(first.price, last.price).unwrap_or(0.0);
        state.oi_change = window
            .iter()
            .find(|p| p.has_open_interest())
            .and_then(|p| math::percent_change(p.open_interest, last.open_interest))
            .unwrap_or(0.0);

        let newest = state.history.back().map(|p| p.timestamp);
        for point in window {
            if newest.map_or(true, |ts| point.timestamp >= ts) {
                state.push_point(point, self.history_limit);
            }
        }

        state.current_oi = last.open_interest;
        state.recompute();

        let extreme = ExtremeCalculator::new(extreme_threshold).is_extreme(&state);
        if extreme && !state.extreme_flag {
            state.extreme_since = Some(now);
            tracing::info!(
                "{} entered extreme OI state (ratio {:.2})",
                symbol,
                state.oi_ratio
            );
        } else if !extreme {
            state.extreme_since = None;
        }
        state.extreme_flag = extreme;
        state.last_updated = now;

        Some(state.clone())
    }

    pub fn get_state(&self, symbol: &str) -> Option<OIState> {
        let entry = self.states.read().get(symbol).cloned()?;
        let state = entry.lock().clone();
        Some(state)
    }

    /// Copies of every symbol's state
    pub fn all_states(&self) -> HashMap<String, OIState> {
        let states = self.states.read();
        states
            .iter()
            .map(|(symbol, entry)| (symbol.clone(), entry.lock().clone()))
            .collect()
    }

    pub fn reset(&self, symbol: &str) -> bool {
        self.states.write().remove(symbol).is_some()
    }

    pub fn reset_all(&self) {
        self.states.write().clear();
    }

    /// Evict states not updated since `cutoff`
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|_, entry| entry.lock().last_updated >= cutoff);
        before - states.len()
    }

    pub fn cleanup(&self, max_age: Duration) -> usize {
        self.cleanup_before(Utc::now() - max_age)
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}
