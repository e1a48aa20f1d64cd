//! Core types shared by every analyzer

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Loosely typed parameter bag, converted to typed settings once per analyzer
pub type Settings = BTreeMap<String, Value>;

/// Single market snapshot for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub symbol: String,
    pub price: f64,
    #[serde(default, alias = "volume24h")]
    pub volume_24h: f64,
    #[serde(default, alias = "openInterest")]
    pub open_interest: f64,
    #[serde(default, alias = "fundingRate")]
    pub funding_rate: f64,
    #[serde(default, alias = "change24h")]
    pub change_24h: f64,
    #[serde(default, alias = "high24h")]
    pub high_24h: f64,
    #[serde(default, alias = "low24h")]
    pub low_24h: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceData {
    pub fn new(symbol: &str, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            volume_24h: 0.0,
            open_interest: 0.0,
            funding_rate: 0.0,
            change_24h: 0.0,
            high_24h: price,
            low_24h: price,
            timestamp,
        }
    }

    pub fn with_volume(mut self, volume_24h: f64) -> Self {
        self.volume_24h = volume_24h;
        self
    }

    pub fn with_open_interest(mut self, open_interest: f64) -> Self {
        self.open_interest = open_interest;
        self
    }

    /// True when the point carries a usable open-interest reading
    pub fn has_open_interest(&self) -> bool {
        self.open_interest.is_finite() && self.open_interest > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else if change < 0.0 {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "neutral" => Some(Direction::Neutral),
            _ => None,
        }
    }
}

/// Semantic tag of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Growth,
    Fall,
    ContinuousUp,
    ContinuousDown,
    HighVolume,
    VolumeSpike,
    VolumeConfirmation,
    VolumeDivergence,
    OiGrowthWithPrice,
    OiGrowthWithFall,
    ExtremeOi,
    BullishOiDivergence,
    BearishOiDivergence,
    CounterGrowth,
    CounterFall,
}

impl SignalType {
    const ALL: [SignalType; 15] = [
        SignalType::Growth,
        SignalType::Fall,
        SignalType::ContinuousUp,
        SignalType::ContinuousDown,
        SignalType::HighVolume,
        SignalType::VolumeSpike,
        SignalType::VolumeConfirmation,
        SignalType::VolumeDivergence,
        SignalType::OiGrowthWithPrice,
        SignalType::OiGrowthWithFall,
        SignalType::ExtremeOi,
        SignalType::BullishOiDivergence,
        SignalType::BearishOiDivergence,
        SignalType::CounterGrowth,
        SignalType::CounterFall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Growth => "growth",
            SignalType::Fall => "fall",
            SignalType::ContinuousUp => "continuous_up",
            SignalType::ContinuousDown => "continuous_down",
            SignalType::HighVolume => "high_volume",
            SignalType::VolumeSpike => "volume_spike",
            SignalType::VolumeConfirmation => "volume_confirmation",
            SignalType::VolumeDivergence => "volume_divergence",
            SignalType::OiGrowthWithPrice => "oi_growth_with_price",
            SignalType::OiGrowthWithFall => "oi_growth_with_fall",
            SignalType::ExtremeOi => "extreme_oi",
            SignalType::BullishOiDivergence => "bullish_oi_divergence",
            SignalType::BearishOiDivergence => "bearish_oi_divergence",
            SignalType::CounterGrowth => "counter_growth",
            SignalType::CounterFall => "counter_fall",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm-specific details attached to a signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Name of the analyzer that produced the signal
    pub strategy: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Numeric diagnostics (ratios, bonuses, counts)
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_continuous: bool,
    pub continuous_from: Option<usize>,
    pub continuous_to: Option<usize>,
    pub divergence_type: Option<String>,
    pub extreme_type: Option<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl SignalMetadata {
    pub fn new(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn with_indicator(mut self, name: &str, value: f64) -> Self {
        self.indicators.insert(name.to_string(), value);
        self
    }
}

/// Trading signal. Values are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub direction: Direction,
    /// Signed percent move; negative for falls
    pub change_percent: f64,
    /// Period in minutes
    pub period: Option<u32>,
    /// 0-100
    pub confidence: f64,
    pub data_points: usize,
    pub start_price: f64,
    pub end_price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: SignalMetadata,
}

impl Signal {
    /// Build a signal with a fresh id; confidence is clamped to [0, 100]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        signal_type: SignalType,
        direction: Direction,
        change_percent: f64,
        confidence: f64,
        data_points: usize,
        start_price: f64,
        end_price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
        metadata: SignalMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            signal_type,
            direction,
            change_percent,
            period: None,
            confidence: crate::analysis::math::clamp_confidence(confidence),
            data_points,
            start_price,
            end_price,
            volume,
            timestamp,
            metadata,
        }
    }

    pub fn with_period(mut self, minutes: u32) -> Self {
        self.period = Some(minutes);
        self
    }

    /// Flatten into a key/value map for transport and logging
    pub fn to_flat_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::from(self.id.clone()));
        map.insert("symbol".to_string(), Value::from(self.symbol.clone()));
        map.insert("type".to_string(), Value::from(self.signal_type.as_str()));
        map.insert("direction".to_string(), Value::from(self.direction.as_str()));
        map.insert("change_percent".to_string(), Value::from(self.change_percent));
        map.insert(
            "period".to_string(),
            self.period.map(Value::from).unwrap_or(Value::Null),
        );
        map.insert("confidence".to_string(), Value::from(self.confidence));
        map.insert("data_points".to_string(), Value::from(self.data_points));
        map.insert("start_price".to_string(), Value::from(self.start_price));
        map.insert("end_price".to_string(), Value::from(self.end_price));
        map.insert("volume".to_string(), Value::from(self.volume));
        map.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );

        let meta = &self.metadata;
        if !meta.strategy.is_empty() {
            map.insert("strategy".to_string(), Value::from(meta.strategy.clone()));
        }
        if !meta.tags.is_empty() {
            map.insert("tags".to_string(), Value::from(meta.tags.clone()));
        }
        if !meta.patterns.is_empty() {
            map.insert("patterns".to_string(), Value::from(meta.patterns.clone()));
        }
        if meta.is_continuous {
            map.insert("is_continuous".to_string(), Value::from(true));
        }
        if let Some(from) = meta.continuous_from {
            map.insert("continuous_from".to_string(), Value::from(from));
        }
        if let Some(to) = meta.continuous_to {
            map.insert("continuous_to".to_string(), Value::from(to));
        }
        if let Some(kind) = &meta.divergence_type {
            map.insert("divergence_type".to_string(), Value::from(kind.clone()));
        }
        if let Some(kind) = &meta.extreme_type {
            map.insert("extreme_type".to_string(), Value::from(kind.clone()));
        }
        for (name, value) in &meta.indicators {
            map.insert(format!("indicator.{}", name), Value::from(*value));
        }
        map
    }

    /// Rebuild a signal from the output of [`Signal::to_flat_map`]
    pub fn from_flat_map(map: &BTreeMap<String, Value>) -> Result<Self> {
        let text = |key: &str| -> Result<String> {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| EngineError::invalid_setting(key, "missing string field"))
        };
        let number = |key: &str| -> Result<f64> {
            map.get(key)
                .and_then(Value::as_f64)
                .ok_or_else(|| EngineError::invalid_setting(key, "missing numeric field"))
        };
        let strings = |key: &str| -> Vec<String> {
            map.get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        let type_str = text("type")?;
        let signal_type = SignalType::parse(&type_str)
            .ok_or_else(|| EngineError::invalid_setting("type", format!("unknown type {}", type_str)))?;
        let direction_str = text("direction")?;
        let direction = Direction::parse(&direction_str).ok_or_else(|| {
            EngineError::invalid_setting("direction", format!("unknown direction {}", direction_str))
        })?;
        let timestamp = DateTime::parse_from_rfc3339(&text("timestamp")?)
            .map_err(|e| EngineError::invalid_setting("timestamp", e.to_string()))?
            .with_timezone(&Utc);

        let indicators = map
            .iter()
            .filter_map(|(k, v)| {
                let name = k.strip_prefix("indicator.")?;
                Some((name.to_string(), v.as_f64()?))
            })
            .collect();

        let metadata = SignalMetadata {
            strategy: map
                .get("strategy")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            tags: strings("tags"),
            indicators,
            is_continuous: map
                .get("is_continuous")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            continuous_from: map
                .get("continuous_from")
                .and_then(Value::as_u64)
                .map(|v| v as usize),
            continuous_to: map
                .get("continuous_to")
                .and_then(Value::as_u64)
                .map(|v| v as usize),
            divergence_type: map
                .get("divergence_type")
                .and_then(Value::as_str)
                .map(str::to_string),
            extreme_type: map
                .get("extreme_type")
                .and_then(Value::as_str)
                .map(str::to_string),
            patterns: strings("patterns"),
        };

        Ok(Signal {
            id: text("id")?,
            symbol: text("symbol")?,
            signal_type,
            direction,
            change_percent: number("change_percent")?,
            period: map.get("period").and_then(Value::as_u64).map(|v| v as u32),
            confidence: number("confidence")?,
            data_points: map
                .get("data_points")
                .and_then(Value::as_u64)
                .unwrap_or_default() as usize,
            start_price: number("start_price")?,
            end_price: number("end_price")?,
            volume: number("volume")?,
            timestamp,
            metadata,
        })
    }
}

/// Generic analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 0-1
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// 0-100
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    #[serde(default)]
    pub custom_settings: Settings,
}

fn default_enabled() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn default_min_confidence() -> f64 {
    50.0
}

fn default_min_data_points() -> usize {
    2
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            weight: default_weight(),
            min_confidence: default_min_confidence(),
            min_data_points: default_min_data_points(),
            custom_settings: Settings::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn with_setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.custom_settings.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(EngineError::Configuration(format!(
                "weight must be within [0, 1], got {}",
                self.weight
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(EngineError::Configuration(format!(
                "min_confidence must be within [0, 100], got {}",
                self.min_confidence
            )));
        }
        if self.min_data_points == 0 {
            return Err(EngineError::Configuration(
                "min_data_points must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running call counters, observability only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerStats {
    pub total_calls: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub last_call_time: Option<DateTime<Utc>>,
}

impl AnalyzerStats {
    pub fn record(&mut self, elapsed: Duration, success: bool, at: DateTime<Utc>) {
        self.total_calls += 1;
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.total_duration += elapsed;
        let average = self.total_duration.as_nanos() / u128::from(self.total_calls);
        self.average_duration = Duration::from_nanos(u64::try_from(average).unwrap_or(u64::MAX));
        self.last_call_time = Some(at);
    }
}
