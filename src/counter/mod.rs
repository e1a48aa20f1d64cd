//! Period-windowed signal counter
//!
//! Each symbol owns a [`CounterState`] that counts qualifying windows inside
//! the selected analysis period. Before every increment the counter resets
//! when the period has elapsed, the signal quota is reached or the analysis
//! period was changed. Confidence is progress towards the quota.
//!
//! Notification is a side channel: qualifying signals are pushed as
//! [`CounterEvent`]s on a bounded channel with `try_send`, so a slow
//! consumer never stalls analysis.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::analysis::settings::SettingsReader;
use crate::analysis::{math, Analyzer, AnalyzerCore, AnalyzerSettings};
use crate::error::{EngineError, Result};
use crate::types::{
    AnalyzerConfig, AnalyzerStats, Direction, PriceData, Settings, Signal, SignalMetadata,
    SignalType,
};

pub const NAME: &str = "counter_analyzer";
const VERSION: &str = "1.1.0";

const MIN_SIGNALS: u32 = 5;
const MAX_SIGNALS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisPeriod {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl AnalysisPeriod {
    pub fn minutes(&self) -> u32 {
        match self {
            AnalysisPeriod::M5 => 5,
            AnalysisPeriod::M15 => 15,
            AnalysisPeriod::M30 => 30,
            AnalysisPeriod::H1 => 60,
            AnalysisPeriod::H4 => 240,
            AnalysisPeriod::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes() as i64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPeriod::M5 => "5m",
            AnalysisPeriod::M15 => "15m",
            AnalysisPeriod::M30 => "30m",
            AnalysisPeriod::H1 => "1h",
            AnalysisPeriod::H4 => "4h",
            AnalysisPeriod::D1 => "1d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "5m" => Some(AnalysisPeriod::M5),
            "15m" => Some(AnalysisPeriod::M15),
            "30m" => Some(AnalysisPeriod::M30),
            "1h" | "60m" => Some(AnalysisPeriod::H1),
            "4h" => Some(AnalysisPeriod::H4),
            "1d" | "24h" => Some(AnalysisPeriod::D1),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSettings {
    pub analysis_period: AnalysisPeriod,
    /// Length of one base candle in minutes
    pub base_period_minutes: u32,
    /// Minimum window growth (%) that counts
    pub growth_threshold: f64,
    /// Minimum window fall (%) that counts, as a magnitude
    pub fall_threshold: f64,
    pub track_growth: bool,
    pub track_fall: bool,
    /// Emit a [`CounterEvent`] for each counted window
    pub notify: bool,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            analysis_period: AnalysisPeriod::M15,
            base_period_minutes: 1,
            growth_threshold: 0.1,
            fall_threshold: 0.1,
            track_growth: true,
            track_fall: true,
            notify: true,
        }
    }
}

impl AnalyzerSettings for CounterSettings {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let d = Self::default();
        let r = SettingsReader::new(settings);
        let period = r.get_str("analysis_period", d.analysis_period.as_str())?;
        let analysis_period = AnalysisPeriod::parse(&period).ok_or_else(|| {
            EngineError::invalid_setting(
                "analysis_period",
                format!("expected one of 5m, 15m, 30m, 1h, 4h, 1d, got {}", period),
            )
        })?;
        let base_period_minutes = r.get_usize("base_period_minutes", d.base_period_minutes as usize)?;
        if base_period_minutes == 0 {
            return Err(EngineError::invalid_setting(
                "base_period_minutes",
                "must be at least 1",
            ));
        }
        Ok(Self {
            analysis_period,
            base_period_minutes: u32::try_from(base_period_minutes).map_err(|_| {
                EngineError::invalid_setting("base_period_minutes", "value too large")
            })?,
            growth_threshold: r.get_non_negative_f64("growth_threshold", d.growth_threshold)?,
            fall_threshold: r.get_f64("fall_threshold", d.fall_threshold)?.abs(),
            track_growth: r.get_bool("track_growth", d.track_growth)?,
            track_fall: r.get_bool("track_fall", d.track_fall)?,
            notify: r.get_bool("notify", d.notify)?,
        })
    }
}

impl CounterSettings {
    /// Number of base periods in the analysis period
    pub fn base_period_count(&self) -> u32 {
        self.analysis_period.minutes() / self.base_period_minutes.max(1)
    }

    /// Signal quota per period: half the base periods, within [5, 15]
    pub fn max_signals(&self) -> u32 {
        let base = self.base_period_minutes.max(1);
        let half = (self.analysis_period.minutes() + 2 * base - 1) / (2 * base);
        half.clamp(MIN_SIGNALS, MAX_SIGNALS)
    }

    fn to_custom_settings(&self) -> Settings {
        let mut map = Settings::new();
        map.insert("analysis_period".into(), self.analysis_period.as_str().into());
        map.insert("base_period_minutes".into(), self.base_period_minutes.into());
        map.insert("growth_threshold".into(), self.growth_threshold.into());
        map.insert("fall_threshold".into(), self.fall_threshold.into());
        map.insert("track_growth".into(), self.track_growth.into());
        map.insert("track_fall".into(), self.track_fall.into());
        map.insert("notify".into(), self.notify.into());
        map
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        enabled: true,
        weight: 0.5,
        min_confidence: 0.0,
        min_data_points: 2,
        custom_settings: CounterSettings::default().to_custom_settings(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterState {
    pub symbol: String,
    pub selected_period: AnalysisPeriod,
    pub base_period_count: u32,
    pub signal_count: u32,
    pub growth_count: u32,
    pub fall_count: u32,
    pub period_start_time: DateTime<Utc>,
    pub period_end_time: DateTime<Utc>,
    pub last_signal_time: Option<DateTime<Utc>>,
    pub settings: CounterSettings,
}

impl CounterState {
    fn new(symbol: &str, settings: &CounterSettings, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            symbol: symbol.to_string(),
            selected_period: settings.analysis_period,
            base_period_count: 0,
            signal_count: 0,
            growth_count: 0,
            fall_count: 0,
            period_start_time: now,
            period_end_time: now,
            last_signal_time: None,
            settings: settings.clone(),
        };
        state.restart(settings, now);
        state
    }

    fn restart(&mut self, settings: &CounterSettings, now: DateTime<Utc>) {
        self.selected_period = settings.analysis_period;
        self.base_period_count = settings.base_period_count();
        self.signal_count = 0;
        self.growth_count = 0;
        self.fall_count = 0;
        self.period_start_time = now;
        self.period_end_time = now + settings.analysis_period.duration();
        self.last_signal_time = None;
        self.settings = settings.clone();
    }

    /// Why this counter has to start over before counting, if at all
    fn reset_reason(&self, settings: &CounterSettings, now: DateTime<Utc>) -> Option<&'static str> {
        if self.selected_period != settings.analysis_period {
            Some("period changed")
        } else if now - self.period_start_time >= self.selected_period.duration() {
            Some("period elapsed")
        } else if self.signal_count >= settings.max_signals() {
            Some("quota reached")
        } else {
            None
        }
    }

    fn last_active(&self) -> DateTime<Utc> {
        self.last_signal_time
            .map_or(self.period_start_time, |t| t.max(self.period_start_time))
    }
}

/// Side-channel notification for one counted window
#[derive(Debug, Clone)]
pub struct CounterEvent {
    pub signal: Signal,
    pub state: CounterState,
    pub max_signals: u32,
}

pub struct CounterAnalyzer {
    core: AnalyzerCore<CounterSettings>,
    counters: RwLock<HashMap<String, Arc<Mutex<CounterState>>>>,
    events: Option<mpsc::Sender<CounterEvent>>,
}

impl CounterAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            core: AnalyzerCore::new(config)?,
            counters: RwLock::new(HashMap::new()),
            events: None,
        })
    }

    /// Publish counted windows to `tx`
    pub fn with_events(mut self, tx: mpsc::Sender<CounterEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> CounterSettings {
        self.core.settings()
    }

    /// Analyze with an explicit clock
    pub fn analyze_at(
        &self,
        window: &[PriceData],
        config: &AnalyzerConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<Signal>> {
        self.core
            .run(NAME, window, config, |snapshot| self.count(window, snapshot, now))
    }

    /// Switch the analysis period and restart every symbol's counter
    pub fn set_analysis_period(&self, period: AnalysisPeriod) {
        let changed = self.core.modify_settings(|settings, custom| {
            if settings.analysis_period == period {
                return None;
            }
            settings.analysis_period = period;
            custom.insert("analysis_period".into(), period.as_str().into());
            Some(settings.clone())
        });
        if let Some(settings) = changed {
            let reset = self.restart_all(&settings, Utc::now());
            tracing::info!("Analysis period set to {}, {} counter(s) reset", period, reset);
        }
    }

    pub fn get_counter(&self, symbol: &str) -> Option<CounterState> {
        let entry = self.counters.read().get(symbol).cloned()?;
        let state = entry.lock().clone();
        Some(state)
    }

    pub fn get_all_counters(&self) -> HashMap<String, CounterState> {
        let counters = self.counters.read();
        counters
            .iter()
            .map(|(symbol, entry)| (symbol.clone(), entry.lock().clone()))
            .collect()
    }

    /// Zero one symbol's counter and restart its period
    pub fn reset_symbol(&self, symbol: &str) -> bool {
        let Some(entry) = self.counters.read().get(symbol).cloned() else {
            return false;
        };
        let settings = self.core.settings();
        entry.lock().restart(&settings, Utc::now());
        true
    }

    pub fn reset_all(&self) {
        self.restart_all(&self.core.settings(), Utc::now());
    }

    fn restart_all(&self, settings: &CounterSettings, now: DateTime<Utc>) -> usize {
        let counters = self.counters.read();
        for entry in counters.values() {
            entry.lock().restart(settings, now);
        }
        counters.len()
    }

    /// Drop counters with no activity since `cutoff`
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut counters = self.counters.write();
        let before = counters.len();
        counters.retain(|_, entry| entry.lock().last_active() >= cutoff);
        before - counters.len()
    }

    fn entry(&self, symbol: &str, settings: &CounterSettings, now: DateTime<Utc>) -> Arc<Mutex<CounterState>> {
        if let Some(entry) = self.counters.read().get(symbol) {
            return Arc::clone(entry);
        }
        let mut counters = self.counters.write();
        Arc::clone(
            counters
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CounterState::new(symbol, settings, now)))),
        )
    }

    fn count(&self, window: &[PriceData], snapshot: &CounterSettings, now: DateTime<Utc>) -> Vec<Signal> {
        let first = &window[0];
        let last = &window[window.len() - 1];
        let symbol = last.symbol.as_str();

        let entry = self.entry(symbol, snapshot, now);
        let mut state = entry.lock();
        // Re-read under the counter lock so a period switch that landed
        // after the snapshot is not undone here
        let settings = &self.core.settings();

        if let Some(reason) = state.reset_reason(settings, now) {
            tracing::debug!("Counter for {} reset: {}", symbol, reason);
            state.restart(settings, now);
        }

        let Some(change) = math::percent_change(first.price, last.price) else {
            return Vec::new();
        };
        let (signal_type, direction) = if settings.track_growth && change > settings.growth_threshold {
            state.growth_count += 1;
            (SignalType::CounterGrowth, Direction::Up)
        } else if settings.track_fall && change < -settings.fall_threshold {
            state.fall_count += 1;
            (SignalType::CounterFall, Direction::Down)
        } else {
            return Vec::new();
        };
        state.signal_count += 1;
        state.last_signal_time = Some(now);

        let max_signals = settings.max_signals();
        let confidence = state.signal_count as f64 / max_signals as f64 * 100.0;
        let metadata = SignalMetadata::new(NAME)
            .with_tag("counter")
            .with_tag(settings.analysis_period.as_str())
            .with_indicator("signal_count", state.signal_count as f64)
            .with_indicator("growth_count", state.growth_count as f64)
            .with_indicator("fall_count", state.fall_count as f64)
            .with_indicator("max_signals", max_signals as f64);
        let signal = Signal::new(
            symbol,
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
        .with_period(settings.analysis_period.minutes());

        if settings.notify {
            self.publish(CounterEvent {
                signal: signal.clone(),
                state: state.clone(),
                max_signals,
            });
        }
        vec![signal]
    }

    fn publish(&self, event: CounterEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Counter event queue full, dropping event for {}", event.signal.symbol);
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!("Counter event queue closed, dropping event for {}", event.signal.symbol);
            }
        }
    }
}

impl Analyzer for CounterAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn analyze(&self, window: &[PriceData], config: &AnalyzerConfig) -> Result<Vec<Signal>> {
        self.analyze_at(window, config, Utc::now())
    }

    fn config(&self) -> AnalyzerConfig {
        self.core.config()
    }

    fn stats(&self) -> AnalyzerStats {
        self.core.stats()
    }

    fn reconfigure(&self, config: AnalyzerConfig) -> Result<()> {
        let (previous, current) = self.core.replace(config)?;
        if previous.analysis_period != current.analysis_period {
            let reset = self.restart_all(&current, Utc::now());
            tracing::info!(
                "Analysis period changed {} -> {}, {} counter(s) reset",
                previous.analysis_period,
                current.analysis_period,
                reset
            );
        }
        Ok(())
    }

    fn cleanup(&self, max_age: Duration) -> usize {
        let removed = self.cleanup_before(Utc::now() - max_age);
        if removed > 0 {
            tracing::info!("Evicted {} idle counter(s)", removed);
        }
        removed
    }

    fn reset(&self) {
        self.reset_all();
    }
}
