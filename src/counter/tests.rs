//! Unit tests for the counter analyzer

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::types::{AnalyzerConfig, Direction, PriceData, SignalType};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tokio::sync::mpsc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn window(symbol: &str, from: f64, to: f64) -> Vec<PriceData> {
        vec![
            PriceData::new(symbol, from, t0()).with_volume(1_000_000.0),
            PriceData::new(symbol, to, t0() + Duration::minutes(1)).with_volume(1_000_000.0),
        ]
    }

    fn config() -> AnalyzerConfig {
        default_config()
            .with_setting("analysis_period", "15m")
            .with_setting("base_period_minutes", 1)
            .with_setting("growth_threshold", 0.1)
    }

    #[test]
    fn test_max_signals() {
        let mut settings = CounterSettings::default();
        assert_eq!(settings.max_signals(), 8);
        assert_eq!(settings.base_period_count(), 15);

        settings.analysis_period = AnalysisPeriod::M5;
        assert_eq!(settings.max_signals(), 5);
        settings.analysis_period = AnalysisPeriod::H1;
        assert_eq!(settings.max_signals(), 15);
        settings.analysis_period = AnalysisPeriod::M30;
        settings.base_period_minutes = 5;
        assert_eq!(settings.max_signals(), 5);
    }

    #[test]
    fn test_counter_scenario() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();

        for k in 1..=5u32 {
            let now = t0() + Duration::seconds(k as i64 * 10);
            let signals = analyzer.analyze_at(&window("BTCUSDT", 100.0, 100.2), &cfg, now).unwrap();

            assert_eq!(signals.len(), 1);
            let s = &signals[0];
            assert_eq!(s.signal_type, SignalType::CounterGrowth);
            assert_eq!(s.direction, Direction::Up);
            assert_eq!(s.period, Some(15));
            assert!((s.confidence - k as f64 / 8.0 * 100.0).abs() < 1e-9);

            let state = analyzer.get_counter("BTCUSDT").unwrap();
            assert_eq!(state.growth_count, k);
            assert_eq!(state.signal_count, k);
        }
    }

    #[test]
    fn test_counter_resets_after_quota() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let w = window("BTCUSDT", 100.0, 100.2);

        let mut counts = Vec::new();
        for k in 1..=10 {
            let now = t0() + Duration::seconds(k * 10);
            analyzer.analyze_at(&w, &cfg, now).unwrap();
            counts.push(analyzer.get_counter("BTCUSDT").unwrap().signal_count);
        }

        // Strictly increasing up to the quota, then back to the start
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6, 7, 8, 1, 2]);
    }

    #[test]
    fn test_counter_resets_when_period_elapses() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let w = window("BTCUSDT", 100.0, 100.2);

        analyzer.analyze_at(&w, &cfg, t0()).unwrap();
        analyzer.analyze_at(&w, &cfg, t0() + Duration::minutes(5)).unwrap();
        assert_eq!(analyzer.get_counter("BTCUSDT").unwrap().signal_count, 2);

        analyzer.analyze_at(&w, &cfg, t0() + Duration::minutes(15)).unwrap();
        let state = analyzer.get_counter("BTCUSDT").unwrap();
        assert_eq!(state.signal_count, 1);
        assert_eq!(state.period_start_time, t0() + Duration::minutes(15));
        assert_eq!(state.period_end_time, t0() + Duration::minutes(30));
    }

    #[test]
    fn test_non_qualifying_window_leaves_state_unchanged() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();

        analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 100.2), &cfg, t0())
            .unwrap();
        let before = analyzer.get_counter("BTCUSDT").unwrap();

        let signals = analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 100.05), &cfg, t0() + Duration::minutes(1))
            .unwrap();
        let after = analyzer.get_counter("BTCUSDT").unwrap();

        assert!(signals.is_empty());
        assert_eq!(before, after);
    }

    #[test]
    fn test_fall_counting() {
        let cfg = config().with_setting("fall_threshold", -0.1);
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();

        let signals = analyzer
            .analyze_at(&window("ETHUSDT", 100.0, 99.5), &cfg, t0())
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::CounterFall);
        assert_eq!(signals[0].direction, Direction::Down);
        assert!(signals[0].change_percent < 0.0);
        let state = analyzer.get_counter("ETHUSDT").unwrap();
        assert_eq!(state.fall_count, 1);
        assert_eq!(state.growth_count, 0);
    }

    #[test]
    fn test_tracking_flags() {
        let cfg = config().with_setting("track_growth", false);
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();

        let signals = analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 101.0), &cfg, t0())
            .unwrap();

        assert!(signals.is_empty());
        assert_eq!(analyzer.get_counter("BTCUSDT").unwrap().signal_count, 0);
    }

    #[test]
    fn test_set_analysis_period_resets_every_symbol() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
            analyzer
                .analyze_at(&window(symbol, 100.0, 100.2), &cfg, t0())
                .unwrap();
        }

        analyzer.set_analysis_period(AnalysisPeriod::H1);

        let counters = analyzer.get_all_counters();
        assert_eq!(counters.len(), 3);
        for state in counters.values() {
            assert_eq!(state.signal_count, 0);
            assert_eq!(state.selected_period, AnalysisPeriod::H1);
        }
        assert_eq!(analyzer.settings().analysis_period, AnalysisPeriod::H1);
        assert_eq!(
            analyzer.config().custom_settings["analysis_period"],
            serde_json::json!("1h")
        );
    }

    #[test]
    fn test_reconfigured_period_resets_immediately() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let w = window("BTCUSDT", 100.0, 100.2);
        analyzer.analyze_at(&w, &cfg, t0()).unwrap();
        analyzer.analyze_at(&w, &cfg, t0()).unwrap();
        analyzer.analyze_at(&window("ETHUSDT", 100.0, 100.2), &cfg, t0()).unwrap();

        let cfg = cfg.with_setting("analysis_period", "1h");
        analyzer.reconfigure(cfg.clone()).unwrap();

        // Every symbol restarts before it is touched again
        let counters = analyzer.get_all_counters();
        assert_eq!(counters.len(), 2);
        for state in counters.values() {
            assert_eq!(state.signal_count, 0);
            assert_eq!(state.selected_period, AnalysisPeriod::H1);
        }

        let signals = analyzer.analyze_at(&w, &cfg, t0() + Duration::minutes(1)).unwrap();
        let state = analyzer.get_counter("BTCUSDT").unwrap();
        assert_eq!(state.signal_count, 1);
        assert!((signals[0].confidence - 100.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_reconfigure_same_period_keeps_counts() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let w = window("BTCUSDT", 100.0, 100.2);
        analyzer.analyze_at(&w, &cfg, t0()).unwrap();

        analyzer.reconfigure(cfg.with_setting("growth_threshold", 0.05)).unwrap();

        assert_eq!(analyzer.get_counter("BTCUSDT").unwrap().signal_count, 1);
    }

    #[test]
    fn test_stale_snapshot_does_not_undo_period_switch() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let w = window("BTCUSDT", 100.0, 100.2);
        analyzer.analyze_at(&w, &cfg, t0()).unwrap();

        // An in-flight pass took its snapshot before the switch
        let stale = analyzer.settings();
        analyzer.set_analysis_period(AnalysisPeriod::H1);
        let signals = analyzer.count(&w, &stale, t0() + Duration::minutes(1));

        let state = analyzer.get_counter("BTCUSDT").unwrap();
        assert_eq!(state.selected_period, AnalysisPeriod::H1);
        assert_eq!(state.signal_count, 1);
        assert_eq!(signals[0].period, Some(60));
    }

    #[test]
    fn test_reset_and_cleanup() {
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap();
        let now = Utc::now();
        analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 100.2), &cfg, now - Duration::hours(3))
            .unwrap();
        analyzer
            .analyze_at(&window("ETHUSDT", 100.0, 100.2), &cfg, now)
            .unwrap();

        assert!(analyzer.reset_symbol("ETHUSDT"));
        assert!(!analyzer.reset_symbol("XRPUSDT"));
        assert_eq!(analyzer.get_counter("ETHUSDT").unwrap().signal_count, 0);

        assert_eq!(analyzer.cleanup(Duration::hours(1)), 1);
        assert!(analyzer.get_counter("BTCUSDT").is_none());
        assert!(analyzer.get_counter("ETHUSDT").is_some());
    }

    #[test]
    fn test_invalid_counter_settings() {
        assert!(CounterAnalyzer::new(config().with_setting("analysis_period", "2h")).is_err());
        assert!(CounterAnalyzer::new(config().with_setting("base_period_minutes", 0)).is_err());
        assert!(CounterAnalyzer::new(config().with_setting("growth_threshold", "abc")).is_err());
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(AnalysisPeriod::parse("4h"), Some(AnalysisPeriod::H4));
        assert_eq!(AnalysisPeriod::parse(" 1D "), Some(AnalysisPeriod::D1));
        assert_eq!(AnalysisPeriod::parse("7m"), None);
        assert_eq!(AnalysisPeriod::D1.duration(), Duration::days(1));
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let (tx, mut rx) = mpsc::channel(4);
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap().with_events(tx);

        analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 100.2), &cfg, t0())
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.signal.symbol, "BTCUSDT");
        assert_eq!(event.state.signal_count, 1);
        assert_eq!(event.max_signals, 8);
    }

    #[tokio::test]
    async fn test_full_event_queue_never_blocks() {
        let (tx, mut rx) = mpsc::channel(1);
        let cfg = config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap().with_events(tx);
        let w = window("BTCUSDT", 100.0, 100.2);

        for k in 0..3 {
            let signals = analyzer
                .analyze_at(&w, &cfg, t0() + Duration::seconds(k))
                .unwrap();
            assert_eq!(signals.len(), 1);
        }

        assert_eq!(rx.recv().await.unwrap().state.signal_count, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notify_disabled_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(4);
        let cfg = config().with_setting("notify", false);
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap().with_events(tx);

        analyzer
            .analyze_at(&window("BTCUSDT", 100.0, 100.2), &cfg, t0())
            .unwrap();

        assert!(rx.try_recv().is_err());
    }
}
