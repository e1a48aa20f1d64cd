//! Telegram Bot API `sendMessage` adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{InlineKeyboard, Notifier};
use crate::error::{EngineError, Result};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard>,
}

pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            chat_id,
            api_base: API_BASE.to_string(),
        }
    }

    /// Point at a different Bot API host (self-hosted server, tests)
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str, keyboard: Option<InlineKeyboard>) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: keyboard.filter(|k| !k.is_empty()),
        };

        let response = self.http.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Notify(format!(
                "Telegram sendMessage failed ({}): {}",
                status, body
            )));
        }
        Ok(())
    }
}
