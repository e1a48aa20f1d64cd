//! Analysis engine: registered analyzers -> filter chain -> publisher

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::filter::{FilterChain, FilterStats};
use crate::registry::AnalyzerRegistry;
use crate::types::{PriceData, Signal};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub windows_processed: u64,
    pub signals_generated: u64,
    pub signals_accepted: u64,
    pub signals_filtered: u64,
    pub analyzer_errors: u64,
    pub publish_failures: u64,
}

pub struct AnalysisEngine {
    registry: Arc<AnalyzerRegistry>,
    filters: FilterChain,
    publisher: Option<mpsc::Sender<Signal>>,
    stats: Mutex<EngineStats>,
}

impl AnalysisEngine {
    pub fn new(registry: Arc<AnalyzerRegistry>, filters: FilterChain) -> Self {
        Self {
            registry,
            filters,
            publisher: None,
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Push accepted signals to `tx` as they are produced
    pub fn with_publisher(mut self, tx: mpsc::Sender<Signal>) -> Self {
        self.publisher = Some(tx);
        self
    }

    pub fn registry(&self) -> &Arc<AnalyzerRegistry> {
        &self.registry
    }

    /// Run every enabled analyzer over one symbol's window and return the
    /// accepted signals, highest confidence first
    pub fn process(&self, window: &[PriceData]) -> Vec<Signal> {
        let mut generated = Vec::new();
        let mut errors = 0u64;

        if let Some(symbol) = window.first().map(|p| p.symbol.as_str()) {
            for (name, analyzer) in self.registry.all() {
                let config = analyzer.config();
                if !config.enabled || !analyzer.supports(symbol) {
                    continue;
                }
                match analyzer.analyze(window, &config) {
                    Ok(signals) => generated.extend(signals),
                    Err(e) if e.is_recoverable() => {
                        errors += 1;
                        tracing::debug!("{} skipped {}: {}", name, symbol, e);
                    }
                    Err(e) => {
                        errors += 1;
                        tracing::warn!("{} failed on {}: {}", name, symbol, e);
                    }
                }
            }
        }

        let total = generated.len() as u64;
        // Strongest first, so stateful filters keep the best signal
        generated.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let accepted: Vec<Signal> = generated
            .into_iter()
            .filter(|s| self.filters.apply(s))
            .collect();

        for signal in &accepted {
            tracing::info!(
                "Signal {} {} {} {:+.2}% conf {:.1}",
                signal.symbol,
                signal.signal_type,
                signal.direction.as_str(),
                signal.change_percent,
                signal.confidence
            );
        }
        let publish_failures = self.publish(&accepted);

        let mut stats = self.stats.lock();
        stats.windows_processed += 1;
        stats.signals_generated += total;
        stats.signals_accepted += accepted.len() as u64;
        stats.signals_filtered += total - accepted.len() as u64;
        stats.analyzer_errors += errors;
        stats.publish_failures += publish_failures;
        drop(stats);

        accepted
    }

    fn publish(&self, signals: &[Signal]) -> u64 {
        let Some(tx) = &self.publisher else {
            return 0;
        };
        let mut failures = 0;
        for signal in signals {
            match tx.try_send(signal.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(s)) => {
                    failures += 1;
                    tracing::warn!("Signal queue full, dropping {} for {}", s.signal_type, s.symbol);
                }
                Err(TrySendError::Closed(s)) => {
                    failures += 1;
                    tracing::warn!("Signal queue closed, dropping {} for {}", s.signal_type, s.symbol);
                }
            }
        }
        failures
    }

    /// Evict idle per-symbol state from every analyzer
    pub fn cleanup(&self, max_age: chrono::Duration) -> usize {
        self.registry
            .all()
            .iter()
            .map(|(_, analyzer)| analyzer.cleanup(max_age))
            .sum()
    }

    pub fn stats(&self) -> EngineStats {
        *self.stats.lock()
    }

    pub fn filter_stats(&self) -> Vec<(String, FilterStats)> {
        self.filters.stats()
    }
}
