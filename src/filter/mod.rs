//! Post-analysis signal filters
//!
//! Filters accept or reject already-produced signals:
//! 1. Rate limiting - at most one accepted signal per symbol per delay
//! 2. Volume floor - drop signals on thin markets


use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Signal;

/// Snapshot of a filter's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total_processed: u64,
    pub passed_through: u64,
    pub filtered_out: u64,
}

#[derive(Debug, Default)]
struct FilterCounters {
    total_processed: AtomicU64,
    passed_through: AtomicU64,
    filtered_out: AtomicU64,
}

impl FilterCounters {
    fn record(&self, passed: bool) -> bool {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.passed_through.fetch_add(1, Ordering::Relaxed);
        } else {
            self.filtered_out.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    fn snapshot(&self) -> FilterStats {
        FilterStats {
            total_processed: self.total_processed.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            filtered_out: self.filtered_out.load(Ordering::Relaxed),
        }
    }
}

pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    /// `true` keeps the signal
    fn apply(&self, signal: &Signal) -> bool;

    fn stats(&self) -> FilterStats;
}

/// Per-symbol minimum delay between accepted signals
pub struct RateLimitFilter {
    /// Symbol -> timestamp of the last accepted signal
    last_accepted: RwLock<HashMap<String, DateTime<Utc>>>,
    min_delay: Duration,
    counters: FilterCounters,
}

impl RateLimitFilter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            last_accepted: RwLock::new(HashMap::new()),
            min_delay,
            counters: FilterCounters::default(),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Forget symbols idle for longer than twice the delay, relative to `now`
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.min_delay * 2;
        let mut last = self.last_accepted.write();
        let before = last.len();
        last.retain(|_, t| *t > cutoff);
        before - last.len()
    }

    pub fn tracked_symbols(&self) -> usize {
        self.last_accepted.read().len()
    }
}

impl Filter for RateLimitFilter {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn apply(&self, signal: &Signal) -> bool {
        let now = signal.timestamp;
        let mut last = self.last_accepted.write();
        let passed = match last.get(&signal.symbol) {
            Some(previous) => now - *previous >= self.min_delay,
            None => true,
        };
        if passed {
            last.insert(signal.symbol.clone(), now);
        } else {
            tracing::debug!(
                "Rate limited {} signal for {}",
                signal.signal_type,
                signal.symbol
            );
        }
        self.counters.record(passed)
    }

    fn stats(&self) -> FilterStats {
        self.counters.snapshot()
    }
}

/// Rejects signals whose volume is below a floor
pub struct VolumeFilter {
    min_volume: f64,
    counters: FilterCounters,
}

impl VolumeFilter {
    pub fn new(min_volume: f64) -> Self {
        Self {
            min_volume,
            counters: FilterCounters::default(),
        }
    }
}

impl Filter for VolumeFilter {
    fn name(&self) -> &str {
        "volume"
    }

    fn apply(&self, signal: &Signal) -> bool {
        self.counters.record(signal.volume >= self.min_volume)
    }

    fn stats(&self) -> FilterStats {
        self.counters.snapshot()
    }
}

/// Ordered filters; the first rejection wins
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn apply(&self, signal: &Signal) -> bool {
        self.filters.iter().all(|f| f.apply(signal))
    }

    /// Per-filter stats, in chain order
    pub fn stats(&self) -> Vec<(String, FilterStats)> {
        self.filters
            .iter()
            .map(|f| (f.name().to_string(), f.stats()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
