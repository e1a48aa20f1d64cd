//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;

    fn sample_signal() -> Signal {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::milliseconds(250);
        let mut metadata = SignalMetadata::new("continuous_analyzer")
            .with_tag("strict_run")
            .with_indicator("points", 5.0)
            .with_indicator("total_change", -3.25);
        metadata.is_continuous = true;
        metadata.continuous_from = Some(2);
        metadata.continuous_to = Some(6);
        metadata.patterns = vec!["lower_lows".to_string()];
        Signal::new(
            "SOLUSDT",
            SignalType::ContinuousDown,
            Direction::Down,
            -3.25,
            86.5,
            7,
            150.0,
            145.125,
            3_500_000.0,
            ts,
            metadata,
        )
        .with_period(6)
    }

    #[test]
    fn test_direction_serialization() {
        assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), "\"up\"");
        assert_eq!(serde_json::to_string(&Direction::Neutral).unwrap(), "\"neutral\"");
        let down: Direction = serde_json::from_str("\"down\"").unwrap();
        assert_eq!(down, Direction::Down);
    }

    #[test]
    fn test_signal_type_names() {
        assert_eq!(SignalType::BearishOiDivergence.as_str(), "bearish_oi_divergence");
        assert_eq!(SignalType::parse("extreme_oi"), Some(SignalType::ExtremeOi));
        assert_eq!(SignalType::parse("sideways"), None);
        assert_eq!(
            serde_json::to_string(&SignalType::VolumeSpike).unwrap(),
            "\"volume_spike\""
        );
    }

    #[test]
    fn test_confidence_is_clamped_on_creation() {
        let ts = Utc::now();
        let high = Signal::new(
            "BTCUSDT", SignalType::Growth, Direction::Up, 1.0, 140.0, 2, 1.0, 1.01, 0.0, ts,
            SignalMetadata::default(),
        );
        let low = Signal::new(
            "BTCUSDT", SignalType::Growth, Direction::Up, 1.0, -5.0, 2, 1.0, 1.01, 0.0, ts,
            SignalMetadata::default(),
        );
        assert_eq!(high.confidence, 100.0);
        assert_eq!(low.confidence, 0.0);
        assert_ne!(high.id, low.id);
    }

    #[test]
    fn test_flat_map_keys() {
        let map = sample_signal().to_flat_map();

        assert_eq!(map["type"], Value::from("continuous_down"));
        assert_eq!(map["direction"], Value::from("down"));
        assert_eq!(map["period"], Value::from(6));
        assert_eq!(map["timestamp"], Value::from("2024-03-01T12:00:00.250Z"));
        assert_eq!(map["strategy"], Value::from("continuous_analyzer"));
        assert_eq!(map["indicator.total_change"], Value::from(-3.25));
        assert_eq!(map["continuous_to"], Value::from(6));
        assert!(!map.contains_key("divergence_type"));
    }

    #[test]
    fn test_flat_map_is_lossless() {
        let signal = sample_signal();
        let restored = Signal::from_flat_map(&signal.to_flat_map()).unwrap();
        assert_eq!(restored, signal);
    }

    #[test]
    fn test_flat_map_without_period() {
        let mut signal = sample_signal();
        signal.period = None;
        let map = signal.to_flat_map();
        assert_eq!(map["period"], Value::Null);
        assert_eq!(Signal::from_flat_map(&map).unwrap().period, None);
    }

    #[test]
    fn test_flat_map_rejects_bad_type() {
        let mut map = sample_signal().to_flat_map();
        map.insert("type".to_string(), Value::from("moonshot"));
        assert!(Signal::from_flat_map(&map).is_err());
    }

    #[test]
    fn test_price_data_camel_case_input() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "price": 64000.5,
            "volume24h": 1200000.0,
            "openInterest": 52000.0,
            "timestamp": "2024-03-01T12:00:00Z"
        }"#;
        let point: PriceData = serde_json::from_str(json).unwrap();
        assert_eq!(point.volume_24h, 1_200_000.0);
        assert!(point.has_open_interest());
        assert_eq!(point.funding_rate, 0.0);
    }

    #[test]
    fn test_analyzer_config_validation() {
        assert!(AnalyzerConfig::default().validate().is_ok());
        let bad_weight = AnalyzerConfig {
            weight: 1.5,
            ..Default::default()
        };
        assert!(bad_weight.validate().is_err());
        let bad_confidence = AnalyzerConfig {
            min_confidence: -1.0,
            ..Default::default()
        };
        assert!(bad_confidence.validate().is_err());
        let no_points = AnalyzerConfig {
            min_data_points: 0,
            ..Default::default()
        };
        assert!(no_points.validate().is_err());
    }

    #[test]
    fn test_analyzer_stats_record() {
        let mut stats = AnalyzerStats::default();
        let now = Utc::now();
        stats.record(std::time::Duration::from_millis(4), true, now);
        stats.record(std::time::Duration::from_millis(2), false, now);

        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.average_duration, std::time::Duration::from_millis(3));
        assert_eq!(stats.last_call_time, Some(now));
    }

    #[test]
    fn test_analyzer_stats_average_past_u32_calls() {
        let mut stats = AnalyzerStats {
            total_calls: u64::from(u32::MAX),
            total_duration: std::time::Duration::from_secs(u64::from(u32::MAX)),
            ..Default::default()
        };
        stats.record(std::time::Duration::from_secs(1), true, Utc::now());

        assert_eq!(stats.total_calls, 1 << 32);
        assert_eq!(stats.average_duration, std::time::Duration::from_secs(1));
    }
}
