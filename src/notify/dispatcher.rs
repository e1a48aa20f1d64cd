//! Channel consumer that turns signals and counter events into messages

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{InlineButton, InlineKeyboard, Notifier};
use crate::counter::CounterEvent;
use crate::types::{Direction, Signal, SignalType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Deliver counter events until every sender is dropped
    pub async fn run_counter_events(&self, mut rx: mpsc::Receiver<CounterEvent>) {
        while let Some(event) = rx.recv().await {
            let text = format_counter_notification(&event);
            self.deliver(&event.signal.symbol, &text, Some(symbol_keyboard(&event.signal.symbol)))
                .await;
        }
        tracing::debug!("Counter event channel closed");
    }

    /// Deliver engine signals until every sender is dropped
    pub async fn run_signals(&self, mut rx: mpsc::Receiver<Signal>) {
        while let Some(signal) = rx.recv().await {
            let text = format_signal(&signal);
            self.deliver(&signal.symbol, &text, Some(symbol_keyboard(&signal.symbol)))
                .await;
        }
        tracing::debug!("Signal channel closed");
    }

    async fn deliver(&self, symbol: &str, text: &str, keyboard: Option<InlineKeyboard>) {
        match self.notifier.send_message(text, keyboard).await {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Failed to deliver notification for {}: {}", symbol, e);
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn arrow(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "🟢",
        Direction::Down => "🔴",
        Direction::Neutral => "⚪",
    }
}

fn symbol_keyboard(symbol: &str) -> InlineKeyboard {
    InlineKeyboard::new().row(vec![
        InlineButton::url(
            "Chart",
            &format!("https://www.tradingview.com/chart/?symbol={}", symbol),
        ),
        InlineButton::callback("Mute 1h", &format!("mute:{}:60", symbol)),
    ])
}

/// Counter alert with progress towards the period quota
pub fn format_counter_notification(event: &CounterEvent) -> String {
    let s = &event.signal;
    let state = &event.state;
    let kind = match s.signal_type {
        SignalType::CounterGrowth => "growth",
        _ => "fall",
    };
    format!(
        "{} <b>{}</b> {} counter\n\
         Change: {:+.2}%\n\
         Period: {} (ends {})\n\
         Signals: {}/{} (growth {}, fall {})\n\
         Confidence: {:.1}%\n\
         Price: {} → {}",
        arrow(s.direction),
        s.symbol,
        kind,
        s.change_percent,
        state.selected_period,
        state.period_end_time.format("%H:%M UTC"),
        state.signal_count,
        event.max_signals,
        state.growth_count,
        state.fall_count,
        s.confidence,
        s.start_price,
        s.end_price
    )
}

pub fn format_signal(signal: &Signal) -> String {
    let mut text = format!(
        "{} <b>{}</b> {}\n\
         Change: {:+.2}%\n\
         Confidence: {:.1}%\n\
         Price: {} → {}",
        arrow(signal.direction),
        signal.symbol,
        signal.signal_type,
        signal.change_percent,
        signal.confidence,
        signal.start_price,
        signal.end_price
    );
    if let Some(minutes) = signal.period {
        text.push_str(&format!("\nPeriod: {}m", minutes));
    }
    if let Some(kind) = &signal.metadata.divergence_type {
        text.push_str(&format!("\nDivergence: {}", kind));
    }
    if let Some(kind) = &signal.metadata.extreme_type {
        text.push_str(&format!("\nExtreme: {}", kind));
    }
    text
}
