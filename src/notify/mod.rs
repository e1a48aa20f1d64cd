//! Notification delivery
//!
//! Analyzers never talk to a transport. Signals and counter events travel
//! over channels to a [`NotificationDispatcher`], which formats them and
//! hands the text to a [`Notifier`].

pub mod dispatcher;
pub mod telegram;

#[cfg(test)]
mod tests;

pub use dispatcher::{format_counter_notification, format_signal, NotificationDispatcher};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineButton {
    pub fn url(text: &str, url: &str) -> Self {
        Self {
            text: text.to_string(),
            url: Some(url.to_string()),
            callback_data: None,
        }
    }

    pub fn callback(text: &str, data: &str) -> Self {
        Self {
            text: text.to_string(),
            url: None,
            callback_data: Some(data.to_string()),
        }
    }
}

/// Rows of buttons attached under a message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.inline_keyboard.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(|row| row.is_empty())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str, keyboard: Option<InlineKeyboard>) -> Result<()>;
}

/// Writes messages to the log; used when no transport is configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str, keyboard: Option<InlineKeyboard>) -> Result<()> {
        let buttons = keyboard.map_or(0, |k| k.inline_keyboard.iter().map(Vec::len).sum::<usize>());
        tracing::info!("[notify] {} ({} button(s))", text.replace('\n', " | "), buttons);
        Ok(())
    }
}
