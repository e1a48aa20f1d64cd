//! Unit tests for notification delivery

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::counter::{self, CounterAnalyzer};
    use crate::error::EngineError;
    use crate::types::{Direction, PriceData, Signal, SignalMetadata, SignalType};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn signal(symbol: &str) -> Signal {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut metadata = SignalMetadata::new("open_interest_analyzer");
        metadata.divergence_type = Some("bullish".to_string());
        Signal::new(
            symbol,
            SignalType::BullishOiDivergence,
            Direction::Up,
            4.0,
            72.5,
            5,
            100.0,
            104.0,
            2e6,
            ts,
            metadata,
        )
        .with_period(4)
    }

    #[test]
    fn test_keyboard_serializes_for_bot_api() {
        let keyboard = InlineKeyboard::new().row(vec![
            InlineButton::url("Chart", "https://example.com"),
            InlineButton::callback("Mute", "mute:BTCUSDT:60"),
        ]);

        let json = serde_json::to_value(&keyboard).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "inline_keyboard": [[
                    {"text": "Chart", "url": "https://example.com"},
                    {"text": "Mute", "callback_data": "mute:BTCUSDT:60"}
                ]]
            })
        );
        assert!(InlineKeyboard::new().is_empty());
    }

    #[test]
    fn test_format_signal() {
        let text = format_signal(&signal("ETHUSDT"));

        assert!(text.contains("<b>ETHUSDT</b> bullish_oi_divergence"));
        assert!(text.contains("Change: +4.00%"));
        assert!(text.contains("Confidence: 72.5%"));
        assert!(text.contains("Period: 4m"));
        assert!(text.contains("Divergence: bullish"));
    }

    #[tokio::test]
    async fn test_counter_event_is_formatted_and_sent() {
        let (tx, rx) = mpsc::channel(8);
        let cfg = counter::default_config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap().with_events(tx);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = vec![
            PriceData::new("BTCUSDT", 100.0, t0),
            PriceData::new("BTCUSDT", 100.5, t0 + Duration::minutes(1)),
        ];
        analyzer.analyze_at(&window, &cfg, t0).unwrap();
        analyzer.analyze_at(&window, &cfg, t0).unwrap();
        drop(analyzer);

        let mut mock = MockNotifier::new();
        mock.expect_send_message()
            .withf(|text, keyboard| {
                text.contains("<b>BTCUSDT</b> growth counter") && keyboard.is_some()
            })
            .times(2)
            .returning(|_, _| Ok(()));
        let dispatcher = NotificationDispatcher::new(Arc::new(mock));

        dispatcher.run_counter_events(rx).await;

        assert_eq!(dispatcher.stats().sent, 2);
        assert_eq!(dispatcher.stats().failed, 0);
    }

    #[tokio::test]
    async fn test_counter_message_shows_progress() {
        let (tx, mut rx) = mpsc::channel(8);
        let cfg = counter::default_config();
        let analyzer = CounterAnalyzer::new(cfg.clone()).unwrap().with_events(tx);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = vec![
            PriceData::new("BTCUSDT", 100.0, t0),
            PriceData::new("BTCUSDT", 100.5, t0 + Duration::minutes(1)),
        ];
        for _ in 0..3 {
            analyzer.analyze_at(&window, &cfg, t0).unwrap();
        }

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let text = format_counter_notification(&last.unwrap());

        assert!(text.contains("Signals: 3/8 (growth 3, fall 0)"));
        assert!(text.contains("Period: 15m (ends 12:15 UTC)"));
        assert!(text.contains("Confidence: 37.5%"));
    }

    #[tokio::test]
    async fn test_failed_delivery_is_counted_and_skipped() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(signal("BTCUSDT")).await.unwrap();
        tx.send(signal("ETHUSDT")).await.unwrap();
        drop(tx);

        let mut mock = MockNotifier::new();
        mock.expect_send_message()
            .withf(|text, _| text.contains("BTCUSDT"))
            .times(1)
            .returning(|_, _| Err(EngineError::Notify("bot blocked".to_string())));
        mock.expect_send_message()
            .withf(|text, _| text.contains("ETHUSDT"))
            .times(1)
            .returning(|_, _| Ok(()));
        let dispatcher = NotificationDispatcher::new(Arc::new(mock));

        dispatcher.run_signals(rx).await;

        assert_eq!(dispatcher.stats().sent, 1);
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier.send_message("hello\nworld", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_telegram_unreachable_host_is_an_error() {
        let notifier = TelegramNotifier::new("token".to_string(), "42".to_string())
            .with_api_base("http://127.0.0.1:9/");

        let result = notifier.send_message("ping", None).await;

        assert!(matches!(result, Err(EngineError::Http(_))));
    }
}
